use std::fmt;

use chrono::NaiveDate;

/// Number of hex characters kept from the digest.
pub const ID_LEN: usize = 8;

/// Short deterministic name of an article, shared by its post file and image directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First [`ID_LEN`] hex characters of `md5("{title}-{YYYY-MM-DD}")`.
///
/// Must stay byte-compatible with the ids of posts already in the archive.
pub fn article_id(title: &str, date: NaiveDate) -> ArticleId {
    let key = format!("{title}-{}", date.format("%Y-%m-%d"));
    let digest = md5::compute(key.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(ID_LEN);
    ArticleId(hex)
}

/// `{YYYY-MM-DD}-{id}.md`
pub fn post_filename(date: NaiveDate, id: &ArticleId) -> String {
    format!("{}-{}.md", date.format("%Y-%m-%d"), id)
}
