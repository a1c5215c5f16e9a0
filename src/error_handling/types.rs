use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadAddress(String),
    NotInRange(String),
    EmptyShell,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::EmptyShell => write!(f, "Shell command must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

#[derive(Debug)]
pub enum ContainerError {
    RuntimeNotAvailable,
    InvalidName(String),
    CommandFailed(String),
    ParseError(String),
    IoError(std::io::Error),
    NotFound(String),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RuntimeNotAvailable => write!(f, "Container runtime not available"),
            ContainerError::InvalidName(name) => write!(f, "Invalid container name: {:?}", name),
            ContainerError::CommandFailed(e) => write!(f, "LXC command failed: {}", e),
            ContainerError::ParseError(e) => write!(f, "Unable to parse container list: {}", e),
            ContainerError::IoError(e) => write!(f, "Container IO error: {}", e),
            ContainerError::NotFound(name) => write!(f, "Container {} not found", name),
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        ContainerError::IoError(err)
    }
}

/// Failures scoped to one console session.
///
/// The `Display` output is what the client receives in an `error` envelope.
#[derive(Debug)]
pub enum SessionError {
    InvalidTarget(String),
    ContainerNotFound(String),
    ContainerNotRunning(String),
    LookupTimedOut(String),
    ContainerError(ContainerError),
    SpawnFailed(String),
    SessionLimitReached,
    AlreadyRegistered,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTarget(name) => write!(f, "Invalid container name: {:?}", name),
            SessionError::ContainerNotFound(name) => write!(f, "Container {} not found", name),
            SessionError::ContainerNotRunning(name) => write!(
                f,
                "Container {} is not running. Please start it first.",
                name
            ),
            SessionError::LookupTimedOut(name) => write!(
                f,
                "Failed to connect to container: looking up {} timed out",
                name
            ),
            SessionError::ContainerError(e) => write!(f, "Failed to connect to container: {}", e),
            SessionError::SpawnFailed(e) => write!(f, "Failed to connect to container: {}", e),
            SessionError::SessionLimitReached => write!(f, "Session limit reached"),
            SessionError::AlreadyRegistered => write!(f, "Session creation failed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ContainerError> for SessionError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::InvalidName(name) => SessionError::InvalidTarget(name),
            ContainerError::NotFound(name) => SessionError::ContainerNotFound(name),
            other => SessionError::ContainerError(other),
        }
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    Malformed(String),
    NotText,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(e) => write!(f, "Malformed message: {}", e),
            ProtocolError::NotText => write!(f, "Message is not valid UTF-8 text"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
    MissingStaticDir(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server failed to bind: {}", e),
            WebError::MissingStaticDir(dir) => write!(f, "Static directory {} does not exist", dir),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    ContainerError(ContainerError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::ContainerError(e) => write!(f, "Container error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
