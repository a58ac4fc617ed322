use thiserror::Error;

/// Reaching or interpreting the release feed failed. Never carries a
/// partially filled result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("[{target}] could not reach release feed {url}: {reason}")]
    Network {
        target: String,
        url: String,
        reason: String,
    },
    #[error("[{target}] release feed answered with HTTP {status}")]
    Status { target: String, status: u16 },
    #[error("[{target}] unexpected release feed payload: {reason}")]
    Parse { target: String, reason: String },
    #[error("[{target}] release feed lists no releases")]
    NoReleases { target: String },
    #[error("[{target}] release {tag} has no {selector}")]
    NoMatchingAsset {
        target: String,
        tag: String,
        selector: String,
    },
}

/// Step of the staging pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStep {
    Lock,
    Download,
    Extract,
    Cleanup,
    VersionWrite,
    Locate,
}

impl std::fmt::Display for StageStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStep::Lock => "lock",
            StageStep::Download => "download",
            StageStep::Extract => "extract",
            StageStep::Cleanup => "cleanup",
            StageStep::VersionWrite => "version write",
            StageStep::Locate => "locate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("[{target}] staging failed during {step}: {reason}")]
pub struct StageError {
    pub target: String,
    pub step: StageStep,
    pub reason: String,
}

impl StageError {
    pub fn new(target: &str, step: StageStep, reason: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            step,
            reason: reason.into(),
        }
    }

    /// Folds a capability error, keeping its whole context chain.
    pub fn from_anyhow(target: &str, step: StageStep, err: &anyhow::Error) -> Self {
        Self::new(target, step, format!("{:#}", err))
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("[{target}] could not prepare install directories: {reason}")]
    Setup { target: String, reason: String },
    #[error("[{target}] no emulator executable available: {reason}")]
    Unresolved { target: String, reason: String },
    #[error("[{target}] failed to start {program}: {reason}")]
    SpawnFailed {
        target: String,
        program: String,
        reason: String,
    },
    #[error("[{target}] {program} exited with {}", exit_label(.code))]
    NonZeroExit {
        target: String,
        program: String,
        code: Option<i32>,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
