use crate::console::backend::ShellLauncher;
use crate::container_management::{validate_container_name, ContainerControl};
use crate::error_handling::types::{ProtocolError, SessionError};
use crate::network::protocol::{self, ClientMessage, ServerMessage};
use crate::session_management::{
    SessionCommand, SessionHandle, SessionMode, SessionRegistry, SessionRunner,
};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

const DECODE_FAILURE: &str = "WebSocket message processing failed";
/// Capacity of a client's outbound event queue.
pub const OUTBOUND_BUFFER: usize = 64;
/// Bound on the container lookup done before a session starts.
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes client envelopes to sessions.
///
/// One gateway serves every client connection. It owns nothing per connection: each
/// connection gets a [`ClientConnection`] that holds at most one session.
pub struct Gateway {
    registry: Arc<SessionRegistry>,
    control: Arc<dyn ContainerControl>,
    launcher: Arc<dyn ShellLauncher>,
    lookup_timeout: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<SessionRegistry>,
        control: Arc<dyn ContainerControl>,
        launcher: Arc<dyn ShellLauncher>,
    ) -> Self {
        Self {
            registry,
            control,
            launcher,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bounds how long a connect waits for the container tool to answer.
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn control(&self) -> &Arc<dyn ContainerControl> {
        &self.control
    }

    pub fn mode(&self) -> SessionMode {
        self.launcher.mode()
    }

    /// Starts serving a new client. `outbound` carries every event for that client, in order.
    pub fn open_connection(self: &Arc<Self>, outbound: Sender<ServerMessage>) -> ClientConnection {
        let connection = ClientConnection {
            id: Uuid::new_v4(),
            gateway: self.clone(),
            outbound,
            session: None,
        };
        info!("Client connection {} opened", connection.id);
        connection
    }

    /// Checks that `target` names a running container before anything is spawned.
    async fn validate_target(&self, target: &str) -> Result<(), SessionError> {
        validate_container_name(target)?;

        let lookup = tokio::time::timeout(self.lookup_timeout, self.control.find(target));
        let found = match lookup.await {
            Ok(found) => found?,
            Err(_) => {
                warn!(
                    "Container tool gave no answer for {} within {:?}",
                    target, self.lookup_timeout
                );
                return Err(SessionError::LookupTimedOut(target.to_string()));
            }
        };
        let container =
            found.ok_or_else(|| SessionError::ContainerNotFound(target.to_string()))?;

        if !container.status.is_running() {
            debug!("Container {} is {}", container.name, container.status);
            return Err(SessionError::ContainerNotRunning(container.name));
        }
        Ok(())
    }
}

/// One client's view of the gateway. Owns at most one session at a time.
pub struct ClientConnection {
    id: Uuid,
    gateway: Arc<Gateway>,
    outbound: Sender<ServerMessage>,
    session: Option<SessionHandle>,
}

impl ClientConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the session this connection last started, if it is still live.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session
            .as_ref()
            .filter(|handle| !handle.is_finished())
            .map(|handle| handle.id())
    }

    pub async fn handle_text(&mut self, frame: &str) {
        let decoded = protocol::decode_text(frame);
        self.handle_decoded(decoded).await;
    }

    pub async fn handle_binary(&mut self, frame: &[u8]) {
        let decoded = protocol::decode_binary(frame);
        self.handle_decoded(decoded).await;
    }

    async fn handle_decoded(&mut self, decoded: Result<ClientMessage, ProtocolError>) {
        match decoded {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!("[{}] Discarding client frame: {}", self.id, e);
                self.send(ServerMessage::error(DECODE_FAILURE)).await;
            }
        }
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Connect { container_target } => self.connect(&container_target).await,
            ClientMessage::Input { data } => self.forward(SessionCommand::Input(data)),
            ClientMessage::Resize { cols, rows } => {
                debug!("[{}] Resize to {}x{}", self.id, cols, rows);
                self.forward(SessionCommand::Resize { cols, rows })
            }
            ClientMessage::Disconnect => self.disconnect().await,
        }
    }

    async fn connect(&mut self, target: &str) {
        // The previous session is fully torn down before a new backend exists.
        self.disconnect().await;

        info!("[{}] Connecting to container {}", self.id, target);
        match self.open_session(target).await {
            Ok(handle) => self.session = Some(handle),
            Err(e) => {
                error!("[{}] Connect to {} refused: {}", self.id, target, e);
                self.send(ServerMessage::error(e.to_string())).await;
            }
        }
    }

    async fn open_session(&self, target: &str) -> Result<SessionHandle, SessionError> {
        let gateway = &self.gateway;
        if !gateway.registry.has_capacity() {
            return Err(SessionError::SessionLimitReached);
        }
        gateway.validate_target(target).await?;

        SessionRunner::start(
            gateway.registry.clone(),
            gateway.launcher.as_ref(),
            target,
            self.id,
            &self.outbound,
        )
    }

    /// Input and resize without a live session are dropped; the client may race a teardown.
    fn forward(&self, command: SessionCommand) {
        let delivered = match &self.session {
            Some(handle) => handle.send(command),
            None => false,
        };
        if !delivered {
            debug!("[{}] No live session, dropping client command", self.id);
        }
    }

    /// Tears down the current session, if any. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(handle) = self.session.take() {
            let id = handle.id();
            if let Some(reason) = handle.disconnect().await {
                debug!("[{}] Session {} ended: {:?}", self.id, id, reason);
            }
        }
    }

    /// Called once the client transport is gone.
    pub async fn close(mut self) {
        self.disconnect().await;
        info!("Client connection {} closed", self.id);
    }

    async fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).await.is_err() {
            debug!("[{}] Client gone, dropping event", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::backend::{EventSender, ShellBackend};
    use crate::console::process_adapter::{ProcessAdapter, ShellCommand};
    use crate::console::DemoShellLauncher;
    use crate::container_management::{ContainerStatus, ContainerSummary, DemoControl};
    use crate::session_management::SessionState;
    use std::time::Duration;
    use crate::container_management::Runtime;
    use crate::error_handling::types::ContainerError;
    use async_trait::async_trait;
    use tokio::sync::mpsc::{self, Receiver};
    use tokio::time::timeout;

    fn demo_gateway(max_sessions: usize) -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(SessionRegistry::new(max_sessions)),
            Arc::new(DemoControl::new()),
            Arc::new(DemoShellLauncher),
        ))
    }

    fn client(gateway: &Arc<Gateway>) -> (ClientConnection, Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (gateway.open_connection(tx), rx)
    }

    async fn next(inbox: &mut Receiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("no message within 5s")
            .expect("outbound channel closed")
    }

    /// Collects `data` payloads until `needle` shows up.
    async fn read_until(inbox: &mut Receiver<ServerMessage>, needle: &str) -> String {
        let mut out = String::new();
        while !out.contains(needle) {
            match next(inbox).await {
                ServerMessage::Data { data } => out.push_str(&data),
                other => panic!("unexpected message {:?} while waiting for {:?}", other, needle),
            }
        }
        out
    }

    fn drain(inbox: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = inbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn demo_connect_sends_banner_and_prompt() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_text(r#"{"type":"connect","containerTarget":"demo-ubuntu"}"#)
            .await;

        let id = match next(&mut inbox).await {
            ServerMessage::Connected { id } => id,
            other => panic!("expected connected, got {:?}", other),
        };
        assert_eq!(conn.session_id(), Some(id));

        let banner = read_until(&mut inbox, "$ ").await;
        assert!(banner.contains("Connected to container: demo-ubuntu"));
        assert!(banner.ends_with("$ "));

        let session = gateway.registry().get(&id).unwrap();
        assert_eq!(session.state, SessionState::Connected);
        assert_eq!(session.mode, SessionMode::Demo);
        assert_eq!(session.connection_id, conn.id());
    }

    #[tokio::test]
    async fn enter_yields_a_prompt_with_the_target_name() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);
        conn.handle_text(r#"{"type":"connect","containerName":"demo-ubuntu"}"#)
            .await;
        next(&mut inbox).await;
        read_until(&mut inbox, "$ ").await;

        conn.handle_text(r#"{"type":"input","data":"\r"}"#).await;
        let out = read_until(&mut inbox, "$ ").await;
        assert!(out.contains("Demo command executed"));
        assert!(out.contains("user@demo-ubuntu:~$ "));
    }

    #[tokio::test]
    async fn input_disconnect_leaves_no_session_behind() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);
        conn.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;
        next(&mut inbox).await;

        conn.handle_message(ClientMessage::Input { data: "ls".into() })
            .await;
        conn.handle_message(ClientMessage::Disconnect).await;
        assert!(gateway.registry().is_empty());
        assert_eq!(conn.session_id(), None);

        // Repeated disconnects and late input are silent.
        conn.handle_message(ClientMessage::Disconnect).await;
        conn.handle_message(ClientMessage::Input { data: "x".into() })
            .await;
        conn.handle_message(ClientMessage::Resize { cols: 80, rows: 24 })
            .await;
        let late = drain(&mut inbox);
        assert!(late
            .iter()
            .all(|m| matches!(m, ServerMessage::Data { .. })));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_yields_exactly_one_error() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_text(r#"{"type":"connect","containerTarget":"nope"}"#)
            .await;

        assert_eq!(
            drain(&mut inbox),
            vec![ServerMessage::error("Container nope not found")]
        );
        assert!(gateway.registry().is_empty());
        assert_eq!(conn.session_id(), None);
    }

    #[tokio::test]
    async fn stopped_and_invalid_targets_are_refused() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_text(r#"{"type":"connect","containerTarget":"demo-centos"}"#)
            .await;
        conn.handle_text(r#"{"type":"connect","containerTarget":"--all"}"#)
            .await;

        let messages = drain(&mut inbox);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            ServerMessage::error("Container demo-centos is not running. Please start it first.")
        );
        assert!(matches!(&messages[1], ServerMessage::Error { message } if message.contains("Invalid container name")));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn malformed_frames_keep_the_connection_usable() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_text("{not json").await;
        conn.handle_binary(&[0xc3, 0x28]).await;
        assert_eq!(
            drain(&mut inbox),
            vec![
                ServerMessage::error(DECODE_FAILURE),
                ServerMessage::error(DECODE_FAILURE)
            ]
        );

        conn.handle_binary(br#"{"type":"connect","containerTarget":"demo-ubuntu"}"#)
            .await;
        assert!(matches!(
            next(&mut inbox).await,
            ServerMessage::Connected { .. }
        ));
    }

    #[tokio::test]
    async fn reconnect_replaces_the_session() {
        let gateway = demo_gateway(0);
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;
        let first = conn.session_id().unwrap();

        conn.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;
        let second = conn.session_id().unwrap();

        assert_ne!(first, second);
        assert!(!gateway.registry().contains(&first));
        assert_eq!(gateway.registry().len(), 1);

        let connected: Vec<Uuid> = {
            let mut ids = Vec::new();
            while ids.len() < 2 {
                if let ServerMessage::Connected { id } = next(&mut inbox).await {
                    ids.push(id);
                }
            }
            ids
        };
        assert_eq!(connected, vec![first, second]);

        conn.close().await;
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn session_limit_is_enforced() {
        let gateway = demo_gateway(1);
        let (mut a, mut inbox_a) = client(&gateway);
        let (mut b, mut inbox_b) = client(&gateway);

        a.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;
        b.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;

        assert!(matches!(
            next(&mut inbox_a).await,
            ServerMessage::Connected { .. }
        ));
        assert_eq!(
            drain(&mut inbox_b),
            vec![ServerMessage::error("Session limit reached")]
        );
        assert_eq!(gateway.registry().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sessions_keep_their_own_order() {
        let gateway = Arc::new(Gateway::new(
            Arc::new(SessionRegistry::new(0)),
            Arc::new(DemoControl::with_containers(vec![
                ContainerSummary {
                    name: "alpha".into(),
                    status: ContainerStatus::Running,
                    ipv4_address: None,
                },
                ContainerSummary {
                    name: "beta".into(),
                    status: ContainerStatus::Running,
                    ipv4_address: None,
                },
            ])),
            Arc::new(DemoShellLauncher),
        ));

        let run = |target: &'static str, letter: char| {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                let (mut conn, mut inbox) = client(&gateway);
                conn.handle_message(ClientMessage::Connect {
                    container_target: target.into(),
                })
                .await;
                next(&mut inbox).await;
                read_until(&mut inbox, "$ ").await;

                let typed: String = (0..200).map(|_| letter).collect();
                for c in typed.chars() {
                    conn.handle_message(ClientMessage::Input {
                        data: c.to_string(),
                    })
                    .await;
                }
                conn.handle_message(ClientMessage::Input { data: "\r".into() })
                    .await;

                let echoed = read_until(&mut inbox, "executed").await;
                conn.close().await;
                (typed, echoed)
            })
        };

        let a = run("alpha", 'a');
        let b = run("beta", 'b');
        for task in [a, b] {
            let (typed, echoed) = task.await.unwrap();
            assert!(echoed.starts_with(&typed), "echo out of order: {:?}", echoed);
        }
        assert!(gateway.registry().is_empty());
    }

    /// Runs `/bin/sh -c <script>` through the real process adapter.
    struct ScriptLauncher {
        script: &'static str,
        handshake: Duration,
    }

    impl ShellLauncher for ScriptLauncher {
        fn mode(&self) -> SessionMode {
            SessionMode::Real
        }

        fn launch(
            &self,
            target: &str,
            events: EventSender,
        ) -> Result<Box<dyn ShellBackend>, SessionError> {
            let command = ShellCommand {
                program: "/bin/sh".into(),
                args: vec!["-c".into(), self.script.into()],
                env: Vec::new(),
            };
            Ok(Box::new(ProcessAdapter::spawn(
                target,
                &command,
                self.handshake,
                events,
            )?))
        }
    }

    fn script_gateway(script: &'static str, handshake: Duration) -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(SessionRegistry::new(0)),
            Arc::new(DemoControl::new()),
            Arc::new(ScriptLauncher { script, handshake }),
        ))
    }

    #[tokio::test]
    async fn real_shell_output_then_exit() {
        let gateway = script_gateway("echo ready; read line; echo got:$line", Duration::from_secs(10));
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;
        assert!(matches!(
            next(&mut inbox).await,
            ServerMessage::Connected { .. }
        ));
        let greeting = read_until(&mut inbox, "ready").await;
        assert!(greeting.contains("Connecting to container: demo-ubuntu..."));

        conn.handle_message(ClientMessage::Input {
            data: "hello\n".into(),
        })
        .await;

        let mut output = String::new();
        let code = loop {
            match next(&mut inbox).await {
                ServerMessage::Data { data } => output.push_str(&data),
                ServerMessage::Exit { code } => break code,
                other => panic!("unexpected {:?}", other),
            }
        };
        assert!(output.contains("got:hello"));
        assert_eq!(code, Some(0));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn silent_real_shell_fails_the_handshake() {
        let gateway = script_gateway("sleep 30", Duration::from_millis(200));
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_message(ClientMessage::Connect {
            container_target: "demo-ubuntu".into(),
        })
        .await;

        let mut errors = Vec::new();
        while errors.is_empty() {
            if let ServerMessage::Error { message } = next(&mut inbox).await {
                errors.push(message);
            }
        }
        assert_eq!(errors, vec!["Connection timeout - container may not be responding"]);

        conn.disconnect().await;
        assert!(gateway.registry().is_empty());
        assert!(drain(&mut inbox)
            .iter()
            .all(|m| !matches!(m, ServerMessage::Error { .. })));
    }

    /// A container tool that never answers.
    struct HangingControl;

    #[async_trait]
    impl ContainerControl for HangingControl {
        fn runtime(&self) -> Runtime {
            Runtime::Lxc
        }

        async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
            std::future::pending().await
        }

        async fn start(&self, _name: &str) -> Result<(), ContainerError> {
            std::future::pending().await
        }

        async fn stop(&self, _name: &str) -> Result<(), ContainerError> {
            std::future::pending().await
        }

        async fn delete(&self, _name: &str) -> Result<(), ContainerError> {
            std::future::pending().await
        }

        async fn launch(&self, _image: &str, _name: &str) -> Result<(), ContainerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_container_tool_fails_the_connect() {
        let gateway = Arc::new(
            Gateway::new(
                Arc::new(SessionRegistry::new(0)),
                Arc::new(HangingControl),
                Arc::new(DemoShellLauncher),
            )
            .with_lookup_timeout(Duration::from_secs(3)),
        );
        let (mut conn, mut inbox) = client(&gateway);

        conn.handle_text(r#"{"type":"connect","containerTarget":"web"}"#)
            .await;

        assert_eq!(
            drain(&mut inbox),
            vec![ServerMessage::error(
                "Failed to connect to container: looking up web timed out"
            )]
        );
        assert!(gateway.registry().is_empty());
        assert_eq!(conn.session_id(), None);

        // The connection keeps serving frames afterwards.
        conn.handle_text("{not json").await;
        assert_eq!(drain(&mut inbox), vec![ServerMessage::error(DECODE_FAILURE)]);
    }
}
