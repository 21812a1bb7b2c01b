use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::assets::LocalizationReport;
use crate::fragment::Fragment;
use crate::identity::ArticleId;

pub const UNTITLED: &str = "Untitled";
pub const DEFAULT_AUTHOR: &str = "unknown";

/// Pipeline step an article was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Parsing,
    Extracting,
    Localizing,
    Converting,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Extracting => "extracting",
            Stage::Localizing => "localizing",
            Stage::Converting => "converting",
            Stage::Writing => "writing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    SocialPage,
    AtomFeed,
}

impl SourceKind {
    /// Tags substituted when an article carries no categories of its own.
    pub fn default_tags(self) -> &'static [&'static str] {
        match self {
            SourceKind::SocialPage => &["微信公众号"],
            SourceKind::AtomFeed => &["Cnblogs"],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::SocialPage => f.write_str("social-page"),
            SourceKind::AtomFeed => f.write_str("atom-feed"),
        }
    }
}

/// Normalized metadata and body of one source article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,
    pub author: String,
    pub publish_date: NaiveDate,
    pub canonical_url: String,
    pub thumbnail_url: Option<String>,
    pub categories: Vec<String>,
    pub fragment: Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    ClientSetup,
    RetriesExhausted { attempts: u32 },
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FailureKind::InvalidUrl
                | FailureKind::TooLarge { .. }
                | FailureKind::ClientSetup
                | FailureKind::RetriesExhausted { .. }
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::ClientSetup => write!(f, "http client setup failed"),
            FailureKind::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} attempts")
            }
        }
    }
}

/// A post that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub id: ArticleId,
    pub title: String,
    pub source: String,
    pub path: PathBuf,
    pub assets: LocalizationReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// URL or file name, enough to re-run the item by hand.
    pub source: String,
    pub stage: Stage,
    pub message: String,
}

/// Outcome of a batch; one entry per article or per aborted source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: Vec<PostOutcome>,
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    pub fn record_success(&mut self, outcome: PostOutcome) {
        self.written.push(outcome);
    }

    pub fn record_failure(&mut self, source: impl Into<String>, stage: Stage, message: impl Into<String>) {
        self.failures.push(FailureRecord {
            source: source.into(),
            stage,
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Removes repeated tags, keeping the first occurrence of each.
pub fn dedupe_preserving_order(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
