//! Source-specific extraction into a uniform [`ArticleRecord`].

pub mod atom;
pub mod social;

use chrono::NaiveDate;
use thiserror::Error;

use crate::fragment::Fragment;
use crate::types::{ArticleRecord, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("content container not found in {url}")]
    MissingContent { url: String },
}

pub trait SourceAdapter: Send + Sync {
    /// One unit of raw input, e.g. a fetched page or a feed entry.
    type Raw;

    fn kind(&self) -> SourceKind;

    fn extract_fragment(&self, raw: &Self::Raw) -> Result<Fragment, ExtractError>;

    /// `today` stands in for a missing or unreadable publish date.
    fn extract_article(&self, raw: &Self::Raw, today: NaiveDate) -> Result<ArticleRecord, ExtractError>;

    fn sanitize(&self, _fragment: &mut Fragment) {}
}

/// Trimmed `value`, or `fallback` when blank.
pub(crate) fn non_blank_or(value: Option<&str>, fallback: &str) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
