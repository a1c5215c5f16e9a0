use crate::session_management::{SessionMode, SessionState};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub mode: SessionMode,
    pub container_target: String,
    /// Identifier of the client connection that owns this session.
    pub connection_id: Uuid,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(mode: SessionMode, container_target: &str, connection_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mode,
            container_target: container_target.to_string(),
            connection_id,
            state: SessionState::Connecting,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Applies `next` if the lifecycle allows it. Returns whether the state changed.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            if self.state != next {
                warn!(
                    "[{}] ignoring transition {:?} -> {:?}",
                    self.id, self.state, next
                );
            }
            false
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_connecting_with_unique_id() {
        let connection = Uuid::new_v4();
        let a = Session::new(SessionMode::Demo, "demo-ubuntu", connection);
        let b = Session::new(SessionMode::Demo, "demo-ubuntu", connection);
        assert_ne!(a.id, b.id);
        assert_eq!(a.state, SessionState::Connecting);
        assert_eq!(a.container_target, "demo-ubuntu");
        assert_eq!(a.created_at, a.last_activity_at);
    }

    #[test]
    fn transition_rejects_illegal_edges() {
        let mut session = Session::new(SessionMode::Real, "web", Uuid::new_v4());
        assert!(session.transition(SessionState::Connected));
        assert!(!session.transition(SessionState::Connected));
        assert!(!session.transition(SessionState::Terminated));
        assert!(session.transition(SessionState::Closing));
        assert!(session.transition(SessionState::Terminated));
        assert!(!session.transition(SessionState::Closing));
        assert_eq!(session.state, SessionState::Terminated);
    }

    #[test]
    fn touch_moves_last_activity_forward() {
        let mut session = Session::new(SessionMode::Real, "web", Uuid::new_v4());
        let before = session.last_activity_at;
        session.touch();
        assert!(session.last_activity_at >= before);
    }

    #[test]
    fn serializes_camel_case() {
        let session = Session::new(SessionMode::Demo, "demo-ubuntu", Uuid::new_v4());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["containerTarget"], "demo-ubuntu");
        assert_eq!(json["state"], "connecting");
        assert_eq!(json["mode"], "demo");
        assert!(json.get("lastActivityAt").is_some());
    }
}
