//! Per-article pipeline: fetch, extract, sanitize, identify, localize,
//! convert and write. Articles are processed one after another; a failing
//! article is recorded in the [`BatchReport`] and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_error, engine_info};
use thiserror::Error;

use crate::assets::AssetLocalizer;
use crate::categories::CategoryLookup;
use crate::config::ArchiveConfig;
use crate::convert::{Converter, Html2MdConverter};
use crate::fetch::Fetcher;
use crate::frontmatter::{build_front_matter, build_post_document};
use crate::identity::article_id;
use crate::persist::{ensure_output_dir, PersistError, PostWriter};
use crate::source::atom::{read_feed, AtomEntry, AtomFeedAdapter, FeedError};
use crate::source::social::SocialPageAdapter;
use crate::source::{ExtractError, SourceAdapter};
use crate::types::{ArticleRecord, BatchReport, PostOutcome, Stage};
use crate::FetchError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("writing post failed: {0}")]
    Persist(#[from] PersistError),
}

impl ArchiveError {
    pub fn stage(&self) -> Stage {
        match self {
            ArchiveError::Fetch { .. } => Stage::Fetching,
            ArchiveError::Extract(_) => Stage::Extracting,
            ArchiveError::Feed(FeedError::Read { .. }) => Stage::Fetching,
            ArchiveError::Feed(FeedError::Xml(_)) => Stage::Parsing,
            ArchiveError::Persist(_) => Stage::Writing,
        }
    }
}

pub struct Archiver {
    fetcher: Arc<dyn Fetcher>,
    config: ArchiveConfig,
    social: SocialPageAdapter,
    atom: AtomFeedAdapter,
    converter: Box<dyn Converter>,
}

impl Archiver {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: ArchiveConfig, categories: Arc<dyn CategoryLookup>) -> Self {
        Self {
            social: SocialPageAdapter::new(config.default_author.clone()),
            atom: AtomFeedAdapter::new(categories, config.default_author.clone()),
            fetcher,
            config,
            converter: Box::new(Html2MdConverter),
        }
    }

    /// Creates the posts and images directories if they are missing.
    pub fn bootstrap(&self) -> Result<(), PersistError> {
        ensure_output_dir(&self.config.posts_dir())?;
        ensure_output_dir(&self.config.images_dir())
    }

    /// Archives one social-platform article given its id or full URL.
    pub async fn archive_social_page(&self, id_or_url: &str) -> Result<PostOutcome, ArchiveError> {
        let url = SocialPageAdapter::article_url(id_or_url);
        let page = self
            .social
            .fetch(self.fetcher.as_ref(), &url)
            .await
            .map_err(|source| ArchiveError::Fetch {
                url: url.clone(),
                source,
            })?;
        let record = self.social.extract_article(&page, self.config.today())?;
        self.finish(&self.social, record).await
    }

    pub async fn archive_social_batch(&self, ids: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        for id in ids {
            let url = SocialPageAdapter::article_url(id);
            match self.archive_social_page(&url).await {
                Ok(outcome) => report.record_success(outcome),
                Err(err) => record_failure(&mut report, &url, &err),
            }
        }
        report
    }

    pub async fn archive_atom_entry(&self, entry: &AtomEntry) -> Result<PostOutcome, ArchiveError> {
        let record = self.atom.extract_article(entry, self.config.today())?;
        self.finish(&self.atom, record).await
    }

    /// Archives every entry of one feed file. Only an unreadable or
    /// malformed file is an error; failing entries land in the report.
    pub async fn archive_atom_file(&self, path: &Path) -> Result<BatchReport, ArchiveError> {
        let entries = read_feed(path).await?;
        engine_info!("{} entries in {}", entries.len(), path.display());
        let mut report = BatchReport::default();
        for entry in &entries {
            match self.archive_atom_entry(entry).await {
                Ok(outcome) => report.record_success(outcome),
                Err(err) => {
                    let label = entry.link.clone().unwrap_or_else(|| entry.title.clone());
                    record_failure(&mut report, &label, &err);
                }
            }
        }
        Ok(report)
    }

    pub async fn archive_atom_files(&self, paths: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            match self.archive_atom_file(path).await {
                Ok(file_report) => report.merge(file_report),
                Err(err) => record_failure(&mut report, &path.display().to_string(), &err),
            }
        }
        report
    }

    async fn finish<A: SourceAdapter>(&self, adapter: &A, mut record: ArticleRecord) -> Result<PostOutcome, ArchiveError> {
        adapter.sanitize(&mut record.fragment);

        let id = article_id(&record.title, record.publish_date);
        let article_dir = self.config.article_dir(&id);
        let localizer = AssetLocalizer::new(self.fetcher.as_ref(), self.config.download_images)
            .with_base_url(&record.canonical_url);
        let assets = localizer.localize(&mut record.fragment, &article_dir, &id).await;
        let thumbnail = localizer
            .localize_thumbnail(record.thumbnail_url.as_deref(), &article_dir, &id)
            .await;

        let body = self.converter.to_markdown(&record.fragment);
        let front_matter = build_front_matter(&record, adapter.kind(), &thumbnail);
        let document = build_post_document(&front_matter, &body);
        let path = PostWriter::new(self.config.posts_dir()).write_post(record.publish_date, &id, &document)?;
        engine_info!("Wrote \"{}\" ({}) to {}", record.title, record.canonical_url, path.display());

        Ok(PostOutcome {
            id,
            title: record.title,
            source: record.canonical_url,
            path,
            assets,
        })
    }
}

fn record_failure(report: &mut BatchReport, source: &str, err: &ArchiveError) {
    engine_error!("Failed to archive {} while {}: {}", source, err.stage(), err);
    report.record_failure(source, err.stage(), err.to_string());
}
