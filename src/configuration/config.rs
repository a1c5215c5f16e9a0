use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::debug;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LXC_BINARY: &str = "lxc";
const DEFAULT_SHELL: &str = "bash -il";
const DEFAULT_TERM: &str = "xterm-256color";
const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Application configuration structure that defines all runtime parameters.
///
/// The same structure is filled either from the command line (`clap`) or from a TOML file
/// (`serde` + `toml`). Both sources share the same defaults, so a file only has to name the
/// values it changes.
///
/// # Fields Overview
///
/// - `bind_address` / `port`: where the HTTP and WebSocket server listens
/// - `static_dir`: optional directory holding the browser terminal assets
/// - `backend`: real LXC shells, demo shells, or auto-detection at startup
/// - `lxc_binary` / `shell`: how a real shell is spawned inside a container
/// - `term` / `cols` / `rows`: terminal environment handed to the shell
/// - `handshake_timeout_secs`: how long a fresh shell may stay silent before the connect fails
/// - `max_sessions`: upper bound on concurrent console sessions, `0` meaning unlimited
#[derive(Parser, Deserialize, Debug, Clone, PartialEq)]
#[command(name = "shellgate")]
#[command(about = "Browser console gateway for LXC containers")]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Load the configuration from a TOML file instead of the command line
    ///
    /// # Command Line
    /// Use `--config <FILE>` to set this value from the CLI
    #[arg(long = "config", short = 'c')]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Network address to bind the server to.
    ///
    /// # Command Line
    /// Use `--bind-address <ADDRESS>` to set this value from the CLI
    #[arg(long, default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: String,

    /// TCP port of the HTTP and WebSocket server.
    ///
    /// # Command Line
    /// Use `--port <PORT>` or the `PORT` environment variable
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory of static frontend files served under `/`
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Execution backend for console sessions
    ///
    /// `auto` checks `<lxc-binary> --version` once at startup and falls back to the demo shell
    /// when the tool is missing.
    #[arg(long, value_enum, default_value_t = BackendPreference::Auto)]
    pub backend: BackendPreference,

    /// Name or path of the container control tool
    #[arg(long, default_value = DEFAULT_LXC_BINARY)]
    pub lxc_binary: String,

    /// Interactive login shell started inside the container, split on whitespace
    #[arg(long, default_value = DEFAULT_SHELL)]
    pub shell: String,

    /// Value of `TERM` for spawned shells
    #[arg(long, default_value = DEFAULT_TERM)]
    pub term: String,

    /// Initial terminal width exported as `COLUMNS`
    #[arg(long, default_value_t = DEFAULT_COLS)]
    pub cols: u16,

    /// Initial terminal height exported as `LINES`
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    pub rows: u16,

    /// Seconds a freshly spawned shell may stay silent before the connect is failed
    ///
    /// # Command Line
    /// Use `--handshake-timeout-secs <SECONDS>` to set this value from the CLI
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_SECS)]
    pub handshake_timeout_secs: u64,

    /// Maximum number of concurrent sessions allowed
    ///
    /// When this limit is reached, new `connect` requests are rejected. Setting this to `0`
    /// disables the limit.
    ///
    /// # Command Line
    /// Use `--max-sessions <COUNT>` to set this value from the CLI
    #[arg(long, default_value_t = 0)]
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
            backend: BackendPreference::Auto,
            lxc_binary: DEFAULT_LXC_BINARY.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            term: DEFAULT_TERM.to_string(),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            max_sessions: 0,
        }
    }
}

impl Config {
    /// Parses the command line. When `--config` is present the named file replaces every
    /// other command-line value.
    ///
    /// # Panics
    /// Exits the process with clap's usage message when the arguments are invalid.
    pub fn from_args() -> Result<Self, ConfigError> {
        let cli = Config::parse();
        match &cli.config_file {
            Some(path) => Self::from_file(path),
            None => {
                cli.validate()?;
                Ok(cli)
            }
        }
    }

    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&raw)?;
        config.config_file = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("{}: {}", self.bind_address, e)))?;

        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "handshake_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.cols == 0 || self.rows == 0 {
            return Err(ConfigError::NotInRange(format!(
                "terminal size {}x{} must be non-zero",
                self.cols, self.rows
            )));
        }

        if self.shell_command().is_empty() {
            return Err(ConfigError::EmptyShell);
        }

        if self.lxc_binary.trim().is_empty() {
            return Err(ConfigError::NotInRange(
                "lxc_binary must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadAddress(format!("{}: {}", self.bind_address, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// The shell command line split into program and arguments.
    pub fn shell_command(&self) -> Vec<String> {
        self.shell.split_whitespace().map(str::to_string).collect()
    }
}
