use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use archiver_engine::{
    discover_categories, load_listings, ArchiveConfig, Archiver, BatchReport, CategoryTable,
    ConfigFile, FetchSettings, ReqwestFetcher,
};
use engine_logging::{engine_info, engine_warn};

use crate::cli::{Cli, Command};

/// Effective settings: built-in defaults, then the config file, then flags.
#[derive(Debug)]
pub struct Settings {
    pub archive: ArchiveConfig,
    pub fetch: FetchSettings,
    pub categories: Option<PathBuf>,
}

pub fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut archive = ArchiveConfig::default();
    let mut fetch = FetchSettings::default();
    let mut categories = None;

    if let Some(path) = &cli.config {
        let file = ConfigFile::load(path)?;
        file.apply(&mut archive, &mut fetch);
        categories = file.categories;
    }
    if let Some(root) = &cli.root {
        archive.blog_root = root.clone();
    }
    if let Some(proxy) = &cli.proxy {
        fetch.proxy = Some(proxy.clone());
    }
    if cli.no_proxy {
        fetch.proxy = None;
    }
    if cli.no_images {
        archive.download_images = false;
    }
    if let Some(max_retries) = cli.max_retries {
        fetch.retry.max_attempts = max_retries;
    }

    Ok(Settings {
        archive,
        fetch,
        categories,
    })
}

/// Ids from a list file: one per line, blank lines and `#` comments ignored.
pub fn read_id_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading id list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(&cli)?;
    engine_info!(
        "Blog root {} (images {})",
        settings.archive.blog_root.display(),
        if settings.archive.download_images { "downloaded" } else { "not downloaded" }
    );
    let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch)?);

    match cli.command {
        Command::Social { mut ids, list } => {
            if let Some(list) = list {
                ids.extend(read_id_list(&list)?);
            }
            if ids.is_empty() {
                bail!("no article ids given");
            }
            let archiver = Archiver::new(fetcher, settings.archive, Arc::new(CategoryTable::new()));
            archiver.bootstrap()?;
            log_report(&archiver.archive_social_batch(&ids).await);
        }
        Command::Atom { files, categories } => {
            let table = match categories.or(settings.categories) {
                Some(path) => CategoryTable::load(&path)?,
                None => CategoryTable::new(),
            };
            engine_info!("Category table has {} posts", table.len());
            let archiver = Archiver::new(fetcher, settings.archive, Arc::new(table));
            archiver.bootstrap()?;
            log_report(&archiver.archive_atom_files(&files).await);
        }
        Command::Discover { listings, out } => {
            let listings = load_listings(&listings)?;
            let table = discover_categories(fetcher.as_ref(), &listings).await;
            let path = table.save(&out)?;
            engine_info!("Wrote {} categorized posts to {}", table.len(), path.display());
        }
    }
    Ok(())
}

fn log_report(report: &BatchReport) {
    engine_info!(
        "Wrote {} posts, {} failed",
        report.written.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        engine_warn!("  {} ({}): {}", failure.source, failure.stage, failure.message);
    }
}
