//! Entry point for a content-load request: locate, update if needed, launch.

use crate::decision::{DecisionState, UpdateDecision};
use crate::download::{ArchiveExtractor, Downloader, Extractor, HttpDownloader};
use crate::error::{LaunchError, StageStep};
use crate::launch::{self, ProcessRunner, SystemRunner};
use crate::locator;
use crate::platform;
use crate::release::{self, GitHubFeed, ReleaseFeed};
use crate::staging::StagingPipeline;
use crate::types::{InstallTarget, ReleaseQuery, UpdateOutcome, UpdatePolicy};
use crate::version_store::{VersionKey, VersionStore};
use std::path::PathBuf;
use std::time::Duration;

/// Result of resolving a target for one load request.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Executable to launch, if any could be resolved.
    pub executable: Option<PathBuf>,
    pub outcome: UpdateOutcome,
    /// `None` when the policy skipped the remote check altogether.
    pub decision: Option<UpdateDecision>,
}

impl Resolution {
    fn skipped(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            outcome: UpdateOutcome::Skipped,
            decision: None,
        }
    }

    pub fn final_state(&self) -> Option<DecisionState> {
        self.decision.as_ref().map(UpdateDecision::state)
    }
}

/// Holds the capabilities every load request needs. Built once by the host
/// and passed to each entry point.
pub struct Launcher {
    feed: Box<dyn ReleaseFeed>,
    downloader: Box<dyn Downloader>,
    extractor: Box<dyn Extractor>,
    runner: Box<dyn ProcessRunner>,
    headers: Vec<(String, String)>,
    lock_stale_after: Duration,
}

impl Launcher {
    pub fn new(
        feed: Box<dyn ReleaseFeed>,
        downloader: Box<dyn Downloader>,
        extractor: Box<dyn Extractor>,
        runner: Box<dyn ProcessRunner>,
    ) -> Self {
        Self {
            feed,
            downloader,
            extractor,
            runner,
            headers: Vec::new(),
            lock_stale_after: Duration::from_secs(3600),
        }
    }

    /// Network, archive and process capabilities backed by the real system.
    pub fn system(user_agent: &str, github_token: Option<&str>, show_progress: bool) -> Self {
        Self::new(
            Box::new(GitHubFeed::new()),
            Box::new(HttpDownloader::new(user_agent).with_progress(show_progress)),
            Box::new(ArchiveExtractor),
            Box::new(SystemRunner),
        )
        .with_headers(release::feed_headers(user_agent, github_token))
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_lock_stale_after(mut self, stale_after: Duration) -> Self {
        self.lock_stale_after = stale_after;
        self
    }

    /// Creates the install directory and the auxiliary folders around it.
    pub fn prepare(&self, target: &InstallTarget) -> Result<(), LaunchError> {
        std::iter::once(&target.root_dir)
            .chain(target.extra_dirs.iter())
            .try_for_each(|dir| platform::ensure_directory(dir).map(|_| ()))
            .map_err(|e| LaunchError::Setup {
                target: target.name.clone(),
                reason: format!("{:#}", e),
            })
    }

    /// Finds the installed executable and installs or updates it when the
    /// release feed says so. A feed or staging failure falls back to the
    /// local executable when there is one.
    pub async fn resolve(
        &self,
        target: &InstallTarget,
        query: Option<&ReleaseQuery>,
    ) -> Result<Resolution, LaunchError> {
        self.prepare(target)?;

        let located = locator::locate(target);
        let local = located.existing_path().map(PathBuf::from);

        let query = match (query, target.update_policy) {
            (None, _) | (_, UpdatePolicy::Never) => {
                tracing::debug!("[{}] Update checks disabled", target.name);
                return Ok(Resolution::skipped(local));
            }
            (Some(_), UpdatePolicy::InstallOnly) if local.is_some() => {
                tracing::debug!("[{}] Installed; updates are left to the emulator", target.name);
                return Ok(Resolution::skipped(local));
            }
            (Some(query), _) => query,
        };

        if local.is_none() {
            tracing::info!("[{}] Emulator not found, downloading it", target.name);
        }

        let store = VersionStore::new(&target.root_dir);
        let mut decision = UpdateDecision::start(&located);
        decision.check_remote();

        let latest =
            match release::fetch_latest(self.feed.as_ref(), &target.name, query, &self.headers).await
            {
                Ok(latest) => latest,
                Err(e) => {
                    decision.remote_failed();
                    if local.is_some() {
                        tracing::warn!("{}; launching the installed build", e);
                    } else {
                        tracing::error!("{}", e);
                    }
                    return Ok(Resolution {
                        executable: local,
                        outcome: UpdateOutcome::Failed(e.to_string()),
                        decision: Some(decision),
                    });
                }
            };

        for (key, value) in [
            (VersionKey::Url, latest.url.as_str()),
            (VersionKey::LatestVersion, latest.version_id.as_str()),
        ] {
            if let Err(e) = store.set(key, value) {
                tracing::warn!("[{}] Could not cache {:?}: {:#}", target.name, key, e);
            }
        }

        let current = store.get(VersionKey::CurrentVersion).unwrap_or_else(|e| {
            tracing::warn!("[{}] Could not read current version: {:#}", target.name, e);
            None
        });
        decision.compare(current.as_deref(), &latest.version_id);

        if decision.state() == DecisionState::UpToDate {
            tracing::info!("[{}] No update found", target.name);
            return Ok(Resolution {
                executable: local,
                outcome: UpdateOutcome::Skipped,
                decision: Some(decision),
            });
        }

        if decision.has_local_install() {
            tracing::info!(
                "[{}] Update found ({} -> {}), downloading update",
                target.name,
                current.as_deref().unwrap_or("unknown"),
                latest.version_id
            );
        }

        let pipeline = StagingPipeline::new(
            self.downloader.as_ref(),
            self.extractor.as_ref(),
            self.lock_stale_after,
        );
        let (outcome, executable) = match pipeline
            .stage(target, &store, &latest.url, &latest.version_id)
            .await
        {
            Ok(path) if decision.has_local_install() => {
                (UpdateOutcome::Updated(path.clone()), Some(path))
            }
            Ok(path) => (UpdateOutcome::Installed(path.clone()), Some(path)),
            // Another process is writing into the root; nothing there can be trusted yet.
            Err(e) if e.step == StageStep::Lock => {
                tracing::error!("{}", e);
                (UpdateOutcome::Failed(e.to_string()), None)
            }
            Err(e) => {
                tracing::error!("{}", e);
                let fallback = locator::locate(target).existing_path().map(PathBuf::from);
                (UpdateOutcome::Failed(e.to_string()), fallback)
            }
        };

        Ok(Resolution {
            executable,
            outcome,
            decision: Some(decision),
        })
    }

    /// Resolves the target and runs the emulator with the content path.
    pub async fn resolve_and_launch(
        &self,
        target: &InstallTarget,
        query: Option<&ReleaseQuery>,
        content: Option<&str>,
    ) -> Result<Resolution, LaunchError> {
        let resolution = self.resolve(target, query).await?;

        let Some(executable) = resolution.executable.as_deref() else {
            let reason = match &resolution.outcome {
                UpdateOutcome::Failed(reason) => reason.clone(),
                _ => format!(
                    "no file matching '{}' in {}",
                    target.binary_pattern,
                    target.root_dir.display()
                ),
            };
            tracing::error!("[{}] Nothing to launch: {}", target.name, reason);
            return Err(LaunchError::Unresolved {
                target: target.name.clone(),
                reason,
            });
        };

        launch::launch(self.runner.as_ref(), target, executable, content)?;
        Ok(resolution)
    }
}
