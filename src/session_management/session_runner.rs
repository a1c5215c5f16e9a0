use crate::console::backend::{BackendEvent, ShellBackend, ShellLauncher, EVENT_BUFFER};
use crate::error_handling::types::SessionError;
use crate::network::protocol::ServerMessage;
use crate::session_management::active_session::SessionCommand;
use crate::session_management::session::Session;
use crate::session_management::session_registry::SessionRegistry;
use crate::session_management::SessionState;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{
    self, Receiver, Sender, UnboundedReceiver, UnboundedSender, WeakSender,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

const TIMEOUT_MESSAGE: &str = "Connection timeout - container may not be responding";

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The client asked for it, or its connection closed.
    ClientDisconnect,
    /// The client link was gone when output had to be delivered.
    ClientGone,
    Exited(Option<i32>),
    Failed(String),
    HandshakeTimeout,
}

/// The task that owns one session's backend.
///
/// Backend events and client commands are drained by a single loop, so output reaches the
/// client in production order and teardown runs exactly once regardless of how many
/// triggers race for it.
///
/// Delivery to the client waits for room in its bounded queue. While it waits no events are
/// drained, the event queue fills up and the backend's output pumps stop reading. Commands
/// are only taken while the event queue has room for whatever the backend emits in reply.
pub struct SessionRunner {
    id: Uuid,
    target: String,
    backend: Box<dyn ShellBackend>,
    events: Receiver<BackendEvent>,
    commands: UnboundedReceiver<SessionCommand>,
    client: WeakSender<ServerMessage>,
    registry: Arc<SessionRegistry>,
}

/// What the owning connection keeps of its session.
pub struct SessionHandle {
    id: Uuid,
    commands: UnboundedSender<SessionCommand>,
    task: JoinHandle<Termination>,
    registry: Arc<SessionRegistry>,
}

impl SessionRunner {
    /// Launches the backend, registers the session and spawns its task.
    ///
    /// On error nothing is left registered and no backend survives.
    pub fn start(
        registry: Arc<SessionRegistry>,
        launcher: &dyn ShellLauncher,
        target: &str,
        connection_id: Uuid,
        client: &Sender<ServerMessage>,
    ) -> Result<SessionHandle, SessionError> {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let mut backend = launcher.launch(target, event_tx)?;

        let session = Session::new(backend.mode(), target, connection_id);
        let id = session.id;
        let (commands_tx, commands) = mpsc::unbounded_channel();

        if let Err(e) = registry.register(session, commands_tx.clone()) {
            backend.terminate();
            return Err(e);
        }

        let runner = SessionRunner {
            id,
            target: target.to_string(),
            backend,
            events,
            commands,
            client: client.downgrade(),
            registry: registry.clone(),
        };
        let task = tokio::spawn(runner.run());

        Ok(SessionHandle {
            id,
            commands: commands_tx,
            task,
            registry,
        })
    }

    async fn run(mut self) -> Termination {
        self.registry.transition(&self.id, SessionState::Connected);
        info!(
            "[{}] Session connected to {} ({:?} mode)",
            self.id,
            self.target,
            self.backend.mode()
        );

        if !self.send(ServerMessage::Connected { id: self.id }).await {
            return self.teardown(Termination::ClientGone).await;
        }

        let startup_timeout = self.backend.startup_timeout();
        let mut awaiting_output = startup_timeout.is_some();
        let deadline = Instant::now() + startup_timeout.unwrap_or(Duration::from_secs(86_400));
        let watchdog = sleep_until(deadline);
        tokio::pin!(watchdog);

        let reason = loop {
            let room_for_reply = self.events.len() < self.events.max_capacity();
            tokio::select! {
                biased;

                command = self.commands.recv(), if room_for_reply => match command {
                    Some(SessionCommand::Input(data)) => {
                        self.registry.touch(&self.id);
                        self.backend.write(&data);
                    }
                    Some(SessionCommand::Resize { cols, rows }) => {
                        self.backend.resize(cols, rows);
                    }
                    Some(SessionCommand::Disconnect) | None => break Termination::ClientDisconnect,
                },
                event = self.events.recv() => match event {
                    Some(BackendEvent::Output(data)) => {
                        awaiting_output = false;
                        self.registry.touch(&self.id);
                        if !self.send(ServerMessage::Data { data }).await {
                            break Termination::ClientGone;
                        }
                    }
                    Some(BackendEvent::Notice(data)) => {
                        if !self.send(ServerMessage::Data { data }).await {
                            break Termination::ClientGone;
                        }
                    }
                    Some(BackendEvent::Exit(code)) => break Termination::Exited(code),
                    Some(BackendEvent::Error(message)) => break Termination::Failed(message),
                    None => break Termination::Exited(None),
                },
                _ = &mut watchdog, if awaiting_output => {
                    warn!("[{}] No output from {} before the handshake timeout", self.id, self.target);
                    break Termination::HandshakeTimeout;
                }
            }
        };

        self.teardown(reason).await
    }

    async fn teardown(mut self, reason: Termination) -> Termination {
        self.registry.transition(&self.id, SessionState::Closing);
        self.commands.close();
        self.backend.terminate();
        self.registry.remove(&self.id);

        let last = match &reason {
            Termination::Exited(code) => Some(ServerMessage::Exit { code: *code }),
            Termination::Failed(message) => Some(ServerMessage::error(format!(
                "Terminal error: {}. Make sure the container is running and accessible.",
                message
            ))),
            Termination::HandshakeTimeout => Some(ServerMessage::error(TIMEOUT_MESSAGE)),
            Termination::ClientDisconnect | Termination::ClientGone => None,
        };
        if let Some(message) = last {
            self.send(message).await;
        }

        info!("[{}] Session for {} terminated: {:?}", self.id, self.target, reason);
        reason
    }

    /// Waits for room in the client queue. Returns false once the client connection is gone.
    async fn send(&self, message: ServerMessage) -> bool {
        match self.client.upgrade() {
            Some(client) => client.send(message).await.is_ok(),
            None => false,
        }
    }
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queues a command. Returns false if the session has already ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests teardown and waits for it. A session that already ended is not touched.
    pub async fn disconnect(self) -> Option<Termination> {
        if !self.task.is_finished() {
            debug!("[{}] Disconnect requested", self.id);
            let _ = self.commands.send(SessionCommand::Disconnect);
        }
        self.wait().await
    }

    pub async fn wait(self) -> Option<Termination> {
        match self.task.await {
            Ok(reason) => Some(reason),
            Err(e) => {
                error!("[{}] Session task failed: {}", self.id, e);
                self.registry.remove(&self.id);
                None
            }
        }
    }
}
