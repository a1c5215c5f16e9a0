use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::container_management::Runtime;
use crate::session_management::{Session, SessionMode, SessionState};

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub mode: SessionMode,
    pub container_target: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            mode: session.mode,
            container_target: session.container_target,
            state: session.state,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: SessionMode,
    pub runtime: Runtime,
    pub sessions: usize,
    /// `0` when unlimited.
    pub max_sessions: usize,
}
