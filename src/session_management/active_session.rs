use crate::session_management::session::Session;
use tokio::sync::mpsc::UnboundedSender;

/// Requests a client connection can make of its session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Input(String),
    Resize { cols: u16, rows: u16 },
    Disconnect,
}

/// Registry entry for a live session: its record and the channel into its task.
pub struct ActiveSession {
    /// The session metadata and state.
    pub session: Session,
    /// Command channel of the task that owns the session's backend.
    pub commands: UnboundedSender<SessionCommand>,
}
