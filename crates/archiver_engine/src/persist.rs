use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::identity::{post_filename, ArticleId};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot use output directory {path}: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize {what}: {reason}")]
    Serialize { what: &'static str, reason: String },
}

impl PersistError {
    fn write(path: &Path, source: io::Error) -> Self {
        PersistError::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Creates `dir` if needed and checks that a file can be created inside it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".to_string())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| unusable(err.to_string()))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|err| unusable(format!("not writable: {err}")))?;
    Ok(())
}

/// Writes whole files through a sibling temp file and a rename, so readers
/// never observe a half-written file.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|err| PersistError::write(&target, err))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file_mut().sync_all())
            .map_err(|err| PersistError::write(&target, err))?;
        // persist() renames over an existing file.
        tmp.persist(&target)
            .map_err(|err| PersistError::write(&target, err.error))?;
        Ok(target)
    }
}

/// Writes finished posts as `{posts_dir}/{date}-{id}.md`.
#[derive(Debug, Clone)]
pub struct PostWriter {
    writer: AtomicFileWriter,
}

impl PostWriter {
    pub fn new(posts_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(posts_dir),
        }
    }

    pub fn write_post(
        &self,
        date: NaiveDate,
        id: &ArticleId,
        document: &str,
    ) -> Result<PathBuf, PersistError> {
        self.writer.write(&post_filename(date, id), document)
    }
}

/// Stores downloaded bytes at `destination`, creating parent directories.
pub async fn write_asset(destination: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| PersistError::write(destination, err))?;
    }
    tokio::fs::write(destination, bytes)
        .await
        .map_err(|err| PersistError::write(destination, err))
}
