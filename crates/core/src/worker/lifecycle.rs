//! Cache store lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    /// Pre-populating the versioned store from the manifest.
    Installing,
    /// Serving requests from the current store.
    Active,
    /// A new version was announced; stale stores not yet enumerated.
    ActivatingNewVersion,
    /// Deleting every store that is not the current version.
    EvictingOldVersions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Install,
    InstallSucceeded,
    InstallFailed,
    Activate,
    Evict,
    Activated,
    /// The store for this version survived a restart.
    Resume,
}

impl LifecycleState {
    /// Apply `event`, returning the next state.
    pub fn transition(self, event: LifecycleEvent) -> Result<Self, Error> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (self, event) {
            (S::Uninitialized, E::Install) => S::Installing,
            (S::Installing, E::InstallSucceeded) => S::Active,
            (S::Installing, E::InstallFailed) => S::Uninitialized,
            (S::Active, E::Activate) => S::ActivatingNewVersion,
            (S::ActivatingNewVersion, E::Evict) => S::EvictingOldVersions,
            (S::EvictingOldVersions, E::Activated) => S::Active,
            (S::Uninitialized, E::Resume) => S::Active,
            (state, event) => return Err(Error::InvalidTransition { state, event }),
        };

        Ok(next)
    }

    /// Whether fetches are intercepted in this state.
    pub fn is_controlling(self) -> bool {
        matches!(self, Self::Active | Self::ActivatingNewVersion | Self::EvictingOldVersions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    #[test]
    fn test_install_then_activate_cycle() {
        let mut state = S::default();
        for event in [E::Install, E::InstallSucceeded, E::Activate, E::Evict, E::Activated] {
            state = state.transition(event).unwrap();
        }
        assert_eq!(state, S::Active);
    }

    #[test]
    fn test_failed_install_returns_to_uninitialized() {
        let state = S::Uninitialized.transition(E::Install).unwrap();
        assert_eq!(state.transition(E::InstallFailed).unwrap(), S::Uninitialized);
    }

    #[test]
    fn test_resume_only_from_uninitialized() {
        assert_eq!(S::Uninitialized.transition(E::Resume).unwrap(), S::Active);
        assert!(S::Installing.transition(E::Resume).is_err());
        assert!(S::Active.transition(E::Resume).is_err());
    }

    #[test]
    fn test_install_only_once() {
        assert!(S::Active.transition(E::Install).is_err());
    }

    #[test]
    fn test_activate_before_install_rejected() {
        let err = S::Uninitialized.transition(E::Activate).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { state: S::Uninitialized, event: E::Activate }));
    }

    #[test]
    fn test_eviction_cannot_be_skipped() {
        assert!(S::ActivatingNewVersion.transition(E::Activated).is_err());
        assert!(S::Installing.transition(E::Activate).is_err());
        assert!(S::EvictingOldVersions.transition(E::Install).is_err());
    }

    #[test]
    fn test_controlling_states() {
        assert!(!S::Uninitialized.is_controlling());
        assert!(!S::Installing.is_controlling());
        assert!(S::Active.is_controlling());
        assert!(S::ActivatingNewVersion.is_controlling());
        assert!(S::EvictingOldVersions.is_controlling());
    }
}
