//! Config entry lifecycle transitions
//!
//! ```text
//! NotLoaded ─▶ SetupInProgress ─▶ Loaded
//!                              ├▶ SetupError ─▶ SetupInProgress
//!                              ├▶ SetupRetry ─▶ SetupInProgress
//!                              └▶ MigrationError
//!
//! Loaded | SetupError | SetupRetry ─▶ UnloadInProgress ─▶ NotLoaded
//!                                                     └▶ FailedUnload
//! ```
//!
//! `MigrationError` and `FailedUnload` are terminal.

use std::time::Duration;

use thiserror::Error;

use crate::entry::ConfigEntryState;

/// Raised when an entry is asked to move along an edge the lifecycle does not have
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Move to `to`, or explain why that edge does not exist
    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let allowed = match self {
            NotLoaded => matches!(to, SetupInProgress),
            SetupInProgress => matches!(to, Loaded | SetupError | SetupRetry | MigrationError),
            SetupError | SetupRetry => matches!(to, SetupInProgress | UnloadInProgress),
            Loaded => matches!(to, UnloadInProgress),
            UnloadInProgress => matches!(to, NotLoaded | FailedUnload),
            MigrationError | FailedUnload => false,
        };

        if allowed {
            return Ok(to);
        }

        let reason = match (self, to) {
            (MigrationError | FailedUnload, _) => "entry is in a terminal state",
            (Loaded, SetupInProgress) => "already loaded, unload first",
            (Loaded, NotLoaded) => "must unload through UnloadInProgress",
            (NotLoaded, _) => "must set up through SetupInProgress",
            (SetupInProgress | UnloadInProgress, _) => "operation still in progress",
            _ => "no such transition",
        };
        Err(InvalidTransition {
            from: self,
            to,
            reason,
        })
    }

    /// Whether `to` is reachable in one step
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}

/// Delay before the next setup attempt of an entry in `SetupRetry`
///
/// `tries` counts earlier failed attempts: 5s, 10s, 20s, 40s, then 80s for
/// every further attempt, plus up to 100ms of jitter.
pub fn calculate_retry_delay(tries: u32) -> Duration {
    let base = 5 * 2_u64.pow(tries.min(4));
    let jitter = rand::random::<f64>() * 0.1;
    Duration::from_secs_f64(base as f64 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_setup_edges() {
        assert!(NotLoaded.can_transition_to(SetupInProgress));
        for to in [Loaded, SetupError, SetupRetry, MigrationError] {
            assert!(SetupInProgress.can_transition_to(to), "{:?}", to);
        }
        assert!(SetupError.can_transition_to(SetupInProgress));
        assert!(SetupRetry.can_transition_to(SetupInProgress));
    }

    #[test]
    fn test_unload_edges() {
        for from in [Loaded, SetupError, SetupRetry] {
            assert!(from.can_transition_to(UnloadInProgress), "{:?}", from);
        }
        assert!(UnloadInProgress.can_transition_to(NotLoaded));
        assert!(UnloadInProgress.can_transition_to(FailedUnload));
    }

    #[test]
    fn test_shortcuts_rejected() {
        let err = NotLoaded.try_transition(Loaded).unwrap_err();
        assert_eq!(err.from, NotLoaded);
        assert_eq!(err.to, Loaded);

        assert!(!Loaded.can_transition_to(NotLoaded));
        assert!(!Loaded.can_transition_to(SetupInProgress));
        assert!(!SetupInProgress.can_transition_to(NotLoaded));
        assert!(!UnloadInProgress.can_transition_to(Loaded));
    }

    #[test]
    fn test_terminal_states() {
        let all = [
            NotLoaded,
            SetupInProgress,
            Loaded,
            SetupError,
            SetupRetry,
            MigrationError,
            UnloadInProgress,
            FailedUnload,
        ];
        for to in all {
            assert!(!MigrationError.can_transition_to(to));
            assert!(!FailedUnload.can_transition_to(to));
        }
        let err = FailedUnload.try_transition(NotLoaded).unwrap_err();
        assert!(err.reason.contains("terminal"));
        assert!(err.to_string().contains("FailedUnload"));
    }

    #[test]
    fn test_retry_delay_backoff_caps() {
        let secs = |tries| calculate_retry_delay(tries).as_secs_f64();
        assert!((5.0..5.2).contains(&secs(0)));
        assert!((10.0..10.2).contains(&secs(1)));
        assert!((20.0..20.2).contains(&secs(2)));
        assert!((40.0..40.2).contains(&secs(3)));
        assert!((80.0..80.2).contains(&secs(4)));
        assert!((80.0..80.2).contains(&secs(9)));
    }
}
