//! Decides whether a load request installs, updates or launches as-is.

use crate::types::ResolvedExecutable;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    NoLocalInstall,
    LocalInstallPresent,
    CheckingRemote,
    UpToDate,
    UpdateAvailable,
    RemoteCheckFailed,
}

impl DecisionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DecisionState::UpToDate
                | DecisionState::UpdateAvailable
                | DecisionState::RemoteCheckFailed
        )
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateDecision {
    state: DecisionState,
    has_local: bool,
    history: Vec<DecisionState>,
}

impl UpdateDecision {
    pub fn start(located: &ResolvedExecutable) -> Self {
        let state = if located.exists {
            DecisionState::LocalInstallPresent
        } else {
            DecisionState::NoLocalInstall
        };
        Self {
            state,
            has_local: located.exists,
            history: vec![state],
        }
    }

    pub fn state(&self) -> DecisionState {
        self.state
    }

    pub fn has_local_install(&self) -> bool {
        self.has_local
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[DecisionState] {
        &self.history
    }

    /// Both starting states move on to the remote check: a local match alone
    /// cannot tell the current build from a stale leftover.
    pub fn check_remote(&mut self) {
        debug_assert!(matches!(
            self.state,
            DecisionState::NoLocalInstall | DecisionState::LocalInstallPresent
        ));
        self.transition(DecisionState::CheckingRemote);
    }

    pub fn remote_failed(&mut self) {
        debug_assert_eq!(self.state, DecisionState::CheckingRemote);
        self.transition(DecisionState::RemoteCheckFailed);
    }

    /// Compares the cached current id against the id the feed reported.
    pub fn compare(&mut self, current: Option<&str>, fetched: &str) {
        debug_assert_eq!(self.state, DecisionState::CheckingRemote);
        let next = match current {
            Some(current) if self.has_local && current == fetched => DecisionState::UpToDate,
            _ => DecisionState::UpdateAvailable,
        };
        self.transition(next);
    }

    fn transition(&mut self, next: DecisionState) {
        tracing::trace!("update decision: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn local() -> ResolvedExecutable {
        ResolvedExecutable::found(PathBuf::from("/emu/app"))
    }

    fn absent() -> ResolvedExecutable {
        ResolvedExecutable::missing(&PathBuf::from("/emu"))
    }

    #[test]
    fn same_id_with_local_install_is_up_to_date() {
        let mut d = UpdateDecision::start(&local());
        d.check_remote();
        d.compare(Some("42"), "42");
        assert_eq!(d.state(), DecisionState::UpToDate);
        assert_eq!(
            d.history(),
            &[
                DecisionState::LocalInstallPresent,
                DecisionState::CheckingRemote,
                DecisionState::UpToDate
            ]
        );
    }

    #[test]
    fn different_id_is_update_available() {
        let mut d = UpdateDecision::start(&local());
        d.check_remote();
        d.compare(Some("40"), "42");
        assert_eq!(d.state(), DecisionState::UpdateAvailable);
    }

    #[test]
    fn missing_marker_is_update_available() {
        let mut d = UpdateDecision::start(&local());
        d.check_remote();
        d.compare(None, "42");
        assert_eq!(d.state(), DecisionState::UpdateAvailable);
    }

    #[test]
    fn no_install_always_installs_even_if_marker_matches() {
        let mut d = UpdateDecision::start(&absent());
        assert_eq!(d.state(), DecisionState::NoLocalInstall);
        d.check_remote();
        d.compare(Some("42"), "42");
        assert_eq!(d.state(), DecisionState::UpdateAvailable);
        assert!(!d.has_local_install());
    }

    #[test]
    fn remote_failure_is_terminal() {
        let mut d = UpdateDecision::start(&local());
        d.check_remote();
        assert!(!d.state().is_terminal());
        d.remote_failed();
        assert_eq!(d.state(), DecisionState::RemoteCheckFailed);
        assert!(d.state().is_terminal());
    }
}
