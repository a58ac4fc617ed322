use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn exe_suffix() -> &'static str {
    std::env::consts::EXE_SUFFIX
}

/// Turns a bare name pattern such as `rpcs3*` into the platform's
/// executable pattern (`rpcs3*.exe` on Windows).
pub fn executable_pattern(stem_pattern: &str) -> String {
    format!("{}{}", stem_pattern, exe_suffix())
}

/// Root under which every target keeps its own install directory.
pub fn default_system_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retrolaunch")
        .join("system")
}

/// Creates `path` if it is missing. Returns whether it had to be created.
pub fn ensure_directory(path: &Path) -> Result<bool> {
    if path.is_dir() {
        tracing::debug!("{} already exists", path.display());
        return Ok(false);
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Could not create directory {}", path.display()))?;
    tracing::info!("Created folder {}", path.display());
    Ok(true)
}

/// Sets the executable bit on Unix; no-op elsewhere.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        if perms.mode() & 0o111 == 0 {
            perms.set_mode(0o755);
            fs::set_permissions(path, perms)?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
