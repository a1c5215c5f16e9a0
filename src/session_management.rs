//! Session management core module.
//!
//! A console session binds one client connection to one shell backend. This module provides
//! the lifecycle types, the process-wide [`SessionRegistry`] and the per-session task that
//! runs the state machine.

use serde::{Deserialize, Serialize};

/// Submodule for the registry entry of a live session.
pub mod active_session;
/// Submodule for the session record.
pub mod session;
/// Submodule for the process-wide registry.
pub mod session_registry;
/// Submodule for the per-session event loop.
pub mod session_runner;

pub use active_session::{ActiveSession, SessionCommand};
pub use session::Session;
pub use session_registry::SessionRegistry;
pub use session_runner::{SessionHandle, SessionRunner, Termination};

/// Represents the current lifecycle state of a session.
///
/// Variants:
/// - `Connecting`: the backend is being created.
/// - `Connected`: the backend is live; input and resize are forwarded.
/// - `Closing`: teardown started; further input is ignored.
/// - `Terminated`: backend released and the session removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Connected,
    Closing,
    Terminated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Connected)
                | (Connecting, Closing)
                | (Connecting, Terminated)
                | (Connected, Closing)
                | (Closing, Terminated)
        )
    }
}

/// Which kind of backend a session drives. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Real,
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_edges() {
        use SessionState::*;
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Terminated));
        assert!(Connected.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Terminated));

        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Connected));
        assert!(!Terminated.can_transition_to(Closing));
        assert!(!Terminated.can_transition_to(Terminated));
        assert!(Terminated.is_terminal());
    }

    #[test]
    fn states_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionState::Connected).unwrap(),
            "\"connected\""
        );
        assert_eq!(serde_json::to_string(&SessionMode::Demo).unwrap(), "\"demo\"");
    }
}
