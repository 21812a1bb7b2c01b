use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::fetch::FetchSettings;
use crate::identity::ArticleId;
use crate::retry::RetryPolicy;
use crate::types::DEFAULT_AUTHOR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Supplies the processing date used when an article's own date is unknown.
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Where and how the archive is written.
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Site root holding `_posts/` and `images/`.
    pub blog_root: PathBuf,
    pub download_images: bool,
    pub default_author: String,
    pub today: Today,
}

impl ArchiveConfig {
    pub fn new(blog_root: impl Into<PathBuf>) -> Self {
        Self {
            blog_root: blog_root.into(),
            download_images: true,
            default_author: DEFAULT_AUTHOR.to_string(),
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Pins the processing date, e.g. for reproducible test runs.
    pub fn with_fixed_today(mut self, date: NaiveDate) -> Self {
        self.today = Arc::new(move || date);
        self
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.blog_root.join("_posts")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.blog_root.join("images")
    }

    pub fn article_dir(&self, id: &ArticleId) -> PathBuf {
        self.images_dir().join(id.as_str())
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("blog_root", &self.blog_root)
            .field("download_images", &self.download_images)
            .field("default_author", &self.default_author)
            .finish_non_exhaustive()
    }
}

/// Optional settings file (RON). Every field overrides the built-in default.
///
/// ```ron
/// (
///     blog_root: Some("../source"),
///     proxy: Some("http://127.0.0.1:7890"),
///     max_attempts: Some(5),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub blog_root: Option<PathBuf>,
    pub download_images: Option<bool>,
    pub default_author: Option<String>,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Category table consulted for feed entries.
    pub categories: Option<PathBuf>,
}

impl ConfigFile {
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn apply(&self, archive: &mut ArchiveConfig, fetch: &mut FetchSettings) {
        if let Some(root) = &self.blog_root {
            archive.blog_root = root.clone();
        }
        if let Some(download) = self.download_images {
            archive.download_images = download;
        }
        if let Some(author) = &self.default_author {
            archive.default_author = author.clone();
        }
        if let Some(proxy) = &self.proxy {
            fetch.proxy = Some(proxy.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            fetch.user_agent = user_agent.clone();
        }
        if let Some(secs) = self.request_timeout_secs {
            fetch.request_timeout = Duration::from_secs(secs);
        }
        if self.max_attempts.is_some() || self.retry_delay_ms.is_some() {
            let max_attempts = self.max_attempts.unwrap_or(fetch.retry.max_attempts);
            fetch.retry = match self.retry_delay_ms {
                Some(0) => RetryPolicy::immediate(max_attempts),
                Some(ms) => RetryPolicy::fixed(max_attempts, Duration::from_millis(ms)),
                None => RetryPolicy {
                    max_attempts,
                    ..fetch.retry
                },
            };
        }
    }
}
