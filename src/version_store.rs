//! Small plain-text metadata records kept next to each install.

use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKey {
    /// Download URL of the newest asset seen on the feed.
    Url,
    /// Id of the build that is actually extracted on disk.
    CurrentVersion,
    /// Id of the newest build seen on the feed.
    LatestVersion,
}

impl VersionKey {
    pub fn file_name(self) -> &'static str {
        match self {
            VersionKey::Url => "url.txt",
            VersionKey::CurrentVersion => "current_version.txt",
            VersionKey::LatestVersion => "latest_version.txt",
        }
    }
}

/// One file per record under the target's root directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    dir: PathBuf,
}

impl VersionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: VersionKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// A missing or blank record reads as `None`.
    pub fn get(&self, key: VersionKey) -> Result<Option<String>> {
        let path = self.record_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Could not read record {}", path.display()))
            }
        }
    }

    /// Writes through a temp file in the same directory and renames it into
    /// place, so readers see either the old or the new value.
    pub fn set(&self, key: VersionKey, value: &str) -> Result<()> {
        let path = self.record_path(key);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create {}", self.dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Could not create temp file in {}", self.dir.display()))?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("Could not replace record {}", path.display()))?;

        tracing::debug!("Wrote {} = {}", path.display(), value);
        Ok(())
    }
}
