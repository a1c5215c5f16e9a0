use log::debug;
use std::time::Duration;

use crate::configuration::Config;
use crate::console::backend::{EventSender, ShellBackend, ShellLauncher};
use crate::console::demo_emulator::DemoEmulator;
use crate::console::process_adapter::{ProcessAdapter, ShellCommand};
use crate::container_management::validate_container_name;
use crate::error_handling::types::SessionError;
use crate::session_management::SessionMode;

/// Spawns `lxc exec <target> -- <shell>` for every session.
#[derive(Debug, Clone)]
pub struct LxcShellLauncher {
    lxc_binary: String,
    shell: Vec<String>,
    term: String,
    cols: u16,
    rows: u16,
    handshake_timeout: Duration,
}

impl LxcShellLauncher {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lxc_binary: config.lxc_binary.clone(),
            shell: config.shell_command(),
            term: config.term.clone(),
            cols: config.cols,
            rows: config.rows,
            handshake_timeout: config.handshake_timeout(),
        }
    }

    pub fn command_for(&self, target: &str) -> ShellCommand {
        ShellCommand::lxc_exec(
            &self.lxc_binary,
            target,
            &self.shell,
            &self.term,
            self.cols,
            self.rows,
        )
    }
}

impl ShellLauncher for LxcShellLauncher {
    fn mode(&self) -> SessionMode {
        SessionMode::Real
    }

    fn launch(
        &self,
        target: &str,
        events: EventSender,
    ) -> Result<Box<dyn ShellBackend>, SessionError> {
        validate_container_name(target)?;
        let adapter = ProcessAdapter::spawn(
            target,
            &self.command_for(target),
            self.handshake_timeout,
            events,
        )?;
        Ok(Box::new(adapter))
    }
}

/// Hands every session a [`DemoEmulator`].
#[derive(Debug, Clone, Default)]
pub struct DemoShellLauncher;

impl ShellLauncher for DemoShellLauncher {
    fn mode(&self) -> SessionMode {
        SessionMode::Demo
    }

    fn launch(
        &self,
        target: &str,
        events: EventSender,
    ) -> Result<Box<dyn ShellBackend>, SessionError> {
        debug!("Using demo mode for console of {}", target);
        Ok(Box::new(DemoEmulator::new(target, events)))
    }
}
