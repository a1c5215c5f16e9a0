use std::time::Duration;
use tokio::sync::mpsc::Sender;

use crate::error_handling::types::SessionError;
use crate::session_management::SessionMode;

/// Something a backend reports to its session, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Bytes produced by the shell, already decoded as UTF-8.
    Output(String),
    /// Gateway-generated text for the client that is not shell output.
    Notice(String),
    /// The shell terminated; `None` when it was killed by a signal.
    Exit(Option<i32>),
    /// The shell failed at the OS level.
    Error(String),
}

/// Capacity of a session's backend event queue. A full queue makes the output pumps wait.
pub const EVENT_BUFFER: usize = 64;

pub type EventSender = Sender<BackendEvent>;

/// The capability a session drives: a real shell process or the demo emulator.
///
/// Backends never block. Input and resize are fire-and-forget, and everything the backend
/// produces goes through the [`EventSender`] it was created with. A synchronous call such
/// as [`write`](ShellBackend::write) may emit at most one event; the session only calls it
/// while the event queue has room.
pub trait ShellBackend: Send + Sync {
    fn mode(&self) -> SessionMode;

    /// Forwards client keystrokes to the shell's input.
    fn write(&mut self, data: &str);

    /// Delivers a window-size change.
    fn resize(&mut self, cols: u16, rows: u16);

    /// How long the backend may stay silent after start before the connect is failed.
    /// `None` disables the watchdog.
    fn startup_timeout(&self) -> Option<Duration>;

    /// Releases the backend. Called exactly once, by the owning session.
    fn terminate(&mut self);
}

/// Creates the backend for a new session.
pub trait ShellLauncher: Send + Sync {
    fn mode(&self) -> SessionMode;

    fn launch(
        &self,
        target: &str,
        events: EventSender,
    ) -> Result<Box<dyn ShellBackend>, SessionError>;
}
