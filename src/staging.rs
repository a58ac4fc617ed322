//! Download-then-extract of a new emulator build into its install directory.

use crate::download::{Downloader, Extractor};
use crate::error::{StageError, StageStep};
use crate::locator;
use crate::platform;
use crate::types::InstallTarget;
use crate::version_store::{VersionKey, VersionStore};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Advisory lock file next to a target's root directory. Held for the whole
/// staging run and removed on drop.
#[derive(Debug)]
pub struct StagingLock {
    path: PathBuf,
}

impl StagingLock {
    pub fn path_for(root_dir: &Path) -> PathBuf {
        let name = root_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "install".to_string());
        root_dir.with_file_name(format!("{}.lock", name))
    }

    /// Takes the lock, reclaiming it if the previous holder left it behind
    /// for longer than `stale_after`.
    pub fn acquire(target: &InstallTarget, stale_after: Duration) -> Result<Self, StageError> {
        let path = Self::path_for(&target.root_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StageError::new(&target.name, StageStep::Lock, e.to_string()))?;
        }

        let busy = || {
            StageError::new(
                &target.name,
                StageStep::Lock,
                format!("another process is staging this target ({})", path.display()),
            )
        };

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = match Self::stale_owner(&path, stale_after) {
                    Some(owner) => owner,
                    None => return Err(busy()),
                };
                // Another process may have reclaimed the lock since we looked.
                if Self::stale_owner(&path, stale_after).as_deref() != Some(owner.as_str()) {
                    return Err(busy());
                }

                tracing::warn!(
                    "[{}] Removing stale staging lock {} (owner {})",
                    target.name,
                    path.display(),
                    owner
                );
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != ErrorKind::NotFound {
                        tracing::warn!("[{}] Could not remove stale lock: {}", target.name, e);
                        return Err(StageError::new(&target.name, StageStep::Lock, e.to_string()));
                    }
                }
                Self::create(&path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => busy(),
                    _ => StageError::new(&target.name, StageStep::Lock, e.to_string()),
                })
            }
            Err(e) => Err(StageError::new(&target.name, StageStep::Lock, e.to_string())),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Returns the recorded owner of a lock older than `stale_after`.
    fn stale_owner(path: &Path, stale_after: Duration) -> Option<String> {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())?;
        if age <= stale_after {
            return None;
        }
        fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Could not remove lock {}: {}", self.path.display(), e);
        }
    }
}

pub struct StagingPipeline<'a> {
    downloader: &'a dyn Downloader,
    extractor: &'a dyn Extractor,
    lock_stale_after: Duration,
}

impl<'a> StagingPipeline<'a> {
    pub fn new(
        downloader: &'a dyn Downloader,
        extractor: &'a dyn Extractor,
        lock_stale_after: Duration,
    ) -> Self {
        Self {
            downloader,
            extractor,
            lock_stale_after,
        }
    }

    /// Installs the build at `url` and records `version_id` as current.
    ///
    /// The archive is unpacked into a scratch directory inside the root and
    /// only moved over the existing install once it is known to contain a
    /// matching executable. The current-version record is written last, so
    /// any failure leaves the previous build and its marker in place.
    /// Safe to re-run after a failure: the archive is overwritten and
    /// re-extracted.
    pub async fn stage(
        &self,
        target: &InstallTarget,
        store: &VersionStore,
        url: &str,
        version_id: &str,
    ) -> Result<PathBuf, StageError> {
        let _lock = StagingLock::acquire(target, self.lock_stale_after)?;
        let name = target.name.as_str();
        let archive = target.archive_path();

        fs::create_dir_all(&target.root_dir)
            .map_err(|e| StageError::new(name, StageStep::Download, e.to_string()))?;

        if let Err(e) = self.downloader.download_file(url, &archive).await {
            tracing::error!("[{}] Failed to download emulator: {:#}", name, e);
            remove_quietly(&archive);
            return Err(StageError::from_anyhow(name, StageStep::Download, &e));
        }
        tracing::info!("[{}] Download successful, extracting emulator", name);

        let staging_dir = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&target.root_dir)
            .map_err(|e| {
                remove_quietly(&archive);
                StageError::new(name, StageStep::Extract, e.to_string())
            })?;

        if let Err(e) = self.extractor.extract(&archive, staging_dir.path()) {
            tracing::error!("[{}] Failed to extract emulator: {:#}", name, e);
            remove_quietly(&archive);
            return Err(StageError::from_anyhow(name, StageStep::Extract, &e));
        }

        fs::remove_file(&archive).map_err(|e| {
            StageError::new(
                name,
                StageStep::Cleanup,
                format!("could not remove {}: {}", archive.display(), e),
            )
        })?;

        let staged = locator::locate_in(
            staging_dir.path(),
            &target.binary_pattern,
            Some(&target.archive_name),
        );
        let file_name = staged
            .existing_path()
            .and_then(Path::file_name)
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                StageError::new(
                    name,
                    StageStep::Locate,
                    format!(
                        "archive contained no file matching '{}'",
                        target.binary_pattern
                    ),
                )
            })?;

        merge_into(staging_dir.path(), &target.root_dir).map_err(|e| {
            StageError::new(
                name,
                StageStep::Extract,
                format!("could not move build into {}: {}", target.root_dir.display(), e),
            )
        })?;

        let executable = target.root_dir.join(file_name);
        if let Err(e) = platform::make_executable(&executable) {
            tracing::warn!("[{}] Could not mark {} executable: {:#}", name, executable.display(), e);
        }

        store
            .set(VersionKey::CurrentVersion, version_id)
            .map_err(|e| StageError::from_anyhow(name, StageStep::VersionWrite, &e))?;

        tracing::info!("[{}] Staged version {} at {}", name, version_id, executable.display());
        Ok(executable)
    }
}

/// Moves every entry of `src` into `dst`, replacing files and merging
/// directories that already exist there.
fn merge_into(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            if to.is_file() {
                fs::remove_file(&to)?;
            }
            if to.is_dir() {
                merge_into(&from, &to)?;
                continue;
            }
        } else if to.is_dir() {
            fs::remove_dir_all(&to)?;
        }
        fs::rename(&from, &to)?;
    }
    Ok(())
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
