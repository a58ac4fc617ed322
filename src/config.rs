use crate::platform;
use crate::types::{AssetSelector, ContentArgStyle, InstallTarget, ReleaseQuery, UpdatePolicy};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "retrolaunch";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Frontend root holding `system/` and `thumbnails/`.
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,
    /// Overrides `<frontend_dir>/system`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default = "default_lock_stale_after_secs")]
    pub lock_stale_after_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_frontend_dir() -> PathBuf {
    platform::default_system_dir()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
fn default_lock_stale_after_secs() -> u64 {
    3600
}
fn default_user_agent() -> String {
    format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION"))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frontend_dir: default_frontend_dir(),
            system_dir: None,
            github_token: None,
            lock_stale_after_secs: default_lock_stale_after_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Settings {
    pub fn system_dir(&self) -> PathBuf {
        self.system_dir
            .clone()
            .unwrap_or_else(|| self.frontend_dir.join("system"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    pub display_name: String,
    /// Install directory, relative to the system directory unless absolute.
    pub dir: PathBuf,
    pub binary_pattern: String,
    #[serde(default)]
    pub launch_flags: Vec<String>,
    #[serde(default)]
    pub content_arg: ContentArgStyle,
    pub archive_name: String,
    /// Extra folders, relative to the frontend directory unless absolute.
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseQuery>,
}

impl TargetConfig {
    pub fn install_target(&self, name: &str, settings: &Settings) -> InstallTarget {
        InstallTarget {
            name: name.to_string(),
            root_dir: settings.system_dir().join(&self.dir),
            binary_pattern: self.binary_pattern.clone(),
            launch_flags: self.launch_flags.clone(),
            content_arg: self.content_arg,
            archive_name: self.archive_name.clone(),
            extra_dirs: self
                .extra_dirs
                .iter()
                .map(|d| settings.frontend_dir.join(d))
                .collect(),
            update_policy: self.update_policy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LauncherConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            targets: builtin_targets(),
        }
    }
}

impl LauncherConfig {
    pub fn target(&self, name: &str) -> Result<(InstallTarget, Option<ReleaseQuery>)> {
        let key = normalize_key(name);
        let cfg = self.targets.get(&key).ok_or_else(|| {
            anyhow!(
                "Unknown target '{}'. Known targets: {}",
                name,
                self.targets.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;
        Ok((cfg.install_target(&key, &self.settings), cfg.release.clone()))
    }
}

fn thumbnail_dirs(system: &str) -> Vec<PathBuf> {
    ["Named_Boxarts", "Named_Snaps", "Named_Titles"]
        .iter()
        .map(|d| Path::new("thumbnails").join(system).join(d))
        .collect()
}

/// The consoles supported out of the box.
pub fn builtin_targets() -> BTreeMap<String, TargetConfig> {
    let mut targets = BTreeMap::new();

    let mut rpcs3_dirs = vec![PathBuf::from("system/rpcs3/bios")];
    rpcs3_dirs.extend(thumbnail_dirs("Sony - Playstation 3"));
    targets.insert(
        "rpcs3".to_string(),
        TargetConfig {
            display_name: "RPCS3 (PlayStation 3)".to_string(),
            dir: PathBuf::from("rpcs3"),
            binary_pattern: platform::executable_pattern("rpcs3*"),
            launch_flags: vec!["--no-gui".to_string()],
            content_arg: ContentArgStyle::QuotedPath,
            archive_name: "rpcs3.7z".to_string(),
            extra_dirs: rpcs3_dirs,
            update_policy: UpdatePolicy::Always,
            release: Some(ReleaseQuery {
                feed_url: "https://api.github.com/repos/RPCS3/rpcs3-binaries-win/releases"
                    .to_string(),
                download_url_template: "https://github.com/RPCS3/rpcs3-binaries-win/releases/download/"
                    .to_string(),
                asset_selector: AssetSelector::Index(0),
            }),
        },
    );

    let mut xenia_dirs = vec![PathBuf::from("system/xenia_canary/bios")];
    xenia_dirs.extend(thumbnail_dirs("Microsoft - Xbox 360"));
    targets.insert(
        "xenia_canary".to_string(),
        TargetConfig {
            display_name: "Xenia Canary (Xbox 360)".to_string(),
            dir: PathBuf::from("xenia_canary"),
            binary_pattern: platform::executable_pattern("xenia_canary*"),
            launch_flags: vec!["--fullscreen=true".to_string()],
            content_arg: ContentArgStyle::QuotedPath,
            archive_name: "xenia_canary.zip".to_string(),
            extra_dirs: xenia_dirs,
            update_policy: UpdatePolicy::Always,
            release: Some(ReleaseQuery {
                feed_url:
                    "https://api.github.com/repos/xenia-canary/xenia-canary-releases/releases"
                        .to_string(),
                download_url_template:
                    "https://github.com/xenia-canary/xenia-canary-releases/releases/download/"
                        .to_string(),
                asset_selector: AssetSelector::Index(1),
            }),
        },
    );

    targets.insert(
        "pcsx2".to_string(),
        TargetConfig {
            display_name: "PCSX2 (PlayStation 2)".to_string(),
            dir: PathBuf::from("pcsx2"),
            binary_pattern: platform::executable_pattern("pcsx2*"),
            launch_flags: vec!["-fullscreen".to_string()],
            content_arg: ContentArgStyle::QuotedPath,
            archive_name: "pcsx2.7z".to_string(),
            extra_dirs: vec![PathBuf::from("system/pcsx2/bios")],
            update_policy: UpdatePolicy::Never,
            release: None,
        },
    );

    targets
}

pub fn get_config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("RETROLAUNCH_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(APP_NAME)
        .join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Loads the config file if present, fills in the built-in targets the file
/// does not override, then applies environment overrides.
pub fn load_config() -> Result<LauncherConfig> {
    let config_path = get_config_file_path()?;
    let mut config = load_config_from(&config_path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_config_from(config_path: &Path) -> Result<LauncherConfig> {
    if !config_path.exists() {
        return Ok(LauncherConfig::default());
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Could not read config file at {}", config_path.display()))?;

    let mut config: LauncherConfig =
        serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")?;

    for (name, target) in builtin_targets() {
        config.targets.entry(name).or_insert(target);
    }
    Ok(config)
}

fn apply_env_overrides(config: &mut LauncherConfig) {
    if let Ok(dir) = std::env::var("RETROLAUNCH_FRONTEND_DIR") {
        config.settings.frontend_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("RETROLAUNCH_SYSTEM_DIR") {
        config.settings.system_dir = Some(PathBuf::from(dir));
    }
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        config.settings.github_token = Some(token);
    }
}

pub fn save_config(config: &LauncherConfig, config_path: &Path) -> Result<()> {
    let config_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid config path"))?;

    fs::create_dir_all(config_dir)?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content)?;

    Ok(())
}

/// Target names are lowercase with underscores: `Xenia-Canary` → `xenia_canary`.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace('-', "_").to_lowercase()
}
