use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::persist::{AtomicFileWriter, PersistError};

/// Read-only mapping from a post's canonical URL to its tags.
pub trait CategoryLookup: Send + Sync {
    fn tags_for(&self, url: &str) -> Option<Vec<String>>;
}

/// URL -> tags table, stored on disk as a RON map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `tag` to the tags of `url`, ignoring repeats.
    pub fn insert(&mut self, url: impl Into<String>, tag: impl Into<String>) {
        let tags = self.entries.entry(url.into()).or_default();
        let tag = tag.into();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_ron(text: &str, origin: &Path) -> Result<Self, ConfigError> {
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
        Self::from_ron(&text, path)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
    }

    pub fn save(&self, path: &Path) -> Result<PathBuf, PersistError> {
        let content = self
            .to_ron()
            .map_err(|err| PersistError::Serialize {
                what: "category table",
                reason: err.to_string(),
            })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "categories.ron".to_string());
        AtomicFileWriter::new(dir).write(&filename, &content)
    }
}

impl CategoryLookup for CategoryTable {
    fn tags_for(&self, url: &str) -> Option<Vec<String>> {
        self.entries.get(url).cloned()
    }
}
