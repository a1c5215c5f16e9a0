use crate::configuration::{BackendPreference, Config};
use crate::console::{DemoShellLauncher, LxcShellLauncher, ShellLauncher};
use crate::container_management::{ContainerControl, DemoControl, LxcControl};
use crate::error_handling::types::*;
use crate::network::gateway::Gateway;
use crate::session_management::SessionRegistry;
use crate::web_interface::WebServer;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for live sessions to tear themselves down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Picks the execution backend once. Every session created later uses it.
    pub async fn select_backend(
        &self,
    ) -> Result<(Arc<dyn ContainerControl>, Arc<dyn ShellLauncher>), ControllerError> {
        let binary = self.config.lxc_binary.as_str();
        let use_lxc = match self.config.backend {
            BackendPreference::Demo => false,
            BackendPreference::Auto => LxcControl::is_runtime_available(binary).await,
            BackendPreference::Lxc => true,
        };

        if use_lxc {
            let control = LxcControl::new(binary)
                .await
                .map_err(ControllerError::ContainerError)?;
            info!("LXC availability: Available");
            Ok((
                Arc::new(control),
                Arc::new(LxcShellLauncher::from_config(&self.config)),
            ))
        } else {
            info!("LXC availability: Not available (demo mode)");
            Ok((Arc::new(DemoControl::new()), Arc::new(DemoShellLauncher)))
        }
    }

    pub async fn build_gateway(&self) -> Result<Arc<Gateway>, ControllerError> {
        let (control, launcher) = self.select_backend().await?;
        let registry = Arc::new(SessionRegistry::new(self.config.max_sessions));
        let gateway = Gateway::new(registry, control, launcher)
            .with_lookup_timeout(self.config.handshake_timeout());
        Ok(Arc::new(gateway))
    }

    /// Serves until Ctrl-C, then drains every live session.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let gateway = self.build_gateway().await?;
        let addr = self.config.socket_addr()?;
        let server = WebServer::new(gateway.clone(), self.config.static_dir.clone());

        let result = tokio::select! {
            result = server.start(addr) => result.map_err(ControllerError::from),
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Shutdown requested"),
                    Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
                }
                Ok(())
            }
        };

        Self::shutdown(gateway.registry()).await;
        result
    }

    /// Asks every session to disconnect and waits for the registry to empty.
    pub async fn shutdown(registry: &Arc<SessionRegistry>) {
        if registry.shutdown_all_sessions() == 0 {
            return;
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("All sessions closed"),
            Err(_) => warn!(
                "{} sessions still open after {:?}",
                registry.len(),
                SHUTDOWN_GRACE
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::gateway::OUTBOUND_BUFFER;
    use crate::network::protocol::{ClientMessage, ServerMessage};
    use crate::session_management::SessionMode;
    use tokio::sync::mpsc;

    fn config(backend: BackendPreference, lxc_binary: &str) -> Config {
        Config {
            backend,
            lxc_binary: lxc_binary.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn new_rejects_invalid_configuration() {
        let mut bad = Config::default();
        bad.bind_address = "not-an-ip".to_string();
        assert!(matches!(
            Controller::new(bad),
            Err(ControllerError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn auto_falls_back_to_demo_without_the_tool() {
        let controller = Controller::new(config(
            BackendPreference::Auto,
            "/nonexistent/lxc-binary",
        ))
        .unwrap();
        let gateway = controller.build_gateway().await.unwrap();
        assert_eq!(gateway.mode(), SessionMode::Demo);
    }

    #[tokio::test]
    async fn forced_lxc_without_the_tool_is_an_error() {
        let controller =
            Controller::new(config(BackendPreference::Lxc, "/nonexistent/lxc-binary")).unwrap();
        assert!(matches!(
            controller.build_gateway().await,
            Err(ControllerError::ContainerError(
                ContainerError::RuntimeNotAvailable
            ))
        ));
    }

    #[tokio::test]
    async fn shutdown_drains_live_sessions() {
        let controller = Controller::new(config(BackendPreference::Demo, "lxc")).unwrap();
        let gateway = controller.build_gateway().await.unwrap();

        let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
        let mut connection = gateway.open_connection(tx);
        connection
            .handle_message(ClientMessage::Connect {
                container_target: "demo-ubuntu".to_string(),
            })
            .await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Connected { .. })
        ));
        assert_eq!(gateway.registry().len(), 1);

        Controller::shutdown(gateway.registry()).await;
        assert!(gateway.registry().is_empty());
        assert_eq!(connection.session_id(), None);
    }
}
