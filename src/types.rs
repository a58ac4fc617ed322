use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How the content path handed over by the host is passed to the emulator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentArgStyle {
    /// Never pass the content path.
    None,
    /// Pass the path as a plain argument.
    RawPath,
    /// Pass the path wrapped in double quotes when it needs them.
    #[default]
    QuotedPath,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Always confirm the installed version against the release feed.
    #[default]
    Always,
    /// Only consult the feed when nothing is installed yet. For emulators
    /// that ship their own updater.
    InstallOnly,
    /// Never touch the network; locate and launch only.
    Never,
}

/// Everything needed to find, stage and launch one external emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    pub root_dir: PathBuf,
    pub binary_pattern: String,
    pub launch_flags: Vec<String>,
    pub content_arg: ContentArgStyle,
    /// File name the downloaded archive is stored under inside `root_dir`.
    pub archive_name: String,
    /// Directories created next to the install (bios, thumbnails, ...).
    pub extra_dirs: Vec<PathBuf>,
    pub update_policy: UpdatePolicy,
}

impl InstallTarget {
    pub fn archive_path(&self) -> PathBuf {
        self.root_dir.join(&self.archive_name)
    }
}

/// Picks one asset out of the assets attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetSelector {
    Index(usize),
    NamePattern(String),
}

impl Default for AssetSelector {
    fn default() -> Self {
        AssetSelector::Index(0)
    }
}

impl fmt::Display for AssetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSelector::Index(i) => write!(f, "asset #{}", i),
            AssetSelector::NamePattern(p) => write!(f, "asset matching '{}'", p),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseQuery {
    pub feed_url: String,
    pub download_url_template: String,
    #[serde(default)]
    pub asset_selector: AssetSelector,
}

/// Newest release asset as seen by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub url: String,
    pub version_id: String,
    pub tag: String,
    pub asset_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubAsset {
    pub name: String,
    pub id: AssetId,
    #[serde(default)]
    pub browser_download_url: Option<String>,
}

/// Feeds expose asset ids either as numbers or as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AssetId {
    Number(u64),
    Text(String),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Number(n) => write!(f, "{}", n),
            AssetId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutable {
    pub path: PathBuf,
    pub exists: bool,
}

impl ResolvedExecutable {
    pub fn found(path: PathBuf) -> Self {
        Self { path, exists: true }
    }

    pub fn missing(searched: &Path) -> Self {
        Self {
            path: searched.to_path_buf(),
            exists: false,
        }
    }

    pub fn existing_path(&self) -> Option<&Path> {
        self.exists.then_some(self.path.as_path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Skipped,
    Installed(PathBuf),
    Updated(PathBuf),
    Failed(String),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Skipped => f.write_str("up to date"),
            UpdateOutcome::Installed(p) => write!(f, "installed {}", p.display()),
            UpdateOutcome::Updated(p) => write!(f, "updated {}", p.display()),
            UpdateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
