//! Core types used by the container management subsystem.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error_handling::types::ContainerError;

/// Lifecycle status reported by the container tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    /// Any other status string (`Frozen`, `Error`, ...), kept verbatim.
    Other(String),
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl From<&str> for ContainerStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Running" => ContainerStatus::Running,
            "Stopped" => ContainerStatus::Stopped,
            other => ContainerStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Running => write!(f, "Running"),
            ContainerStatus::Stopped => write!(f, "Stopped"),
            ContainerStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for ContainerStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Read-only view of one container as reported by the container control service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub name: String,
    pub status: ContainerStatus,
    pub ipv4_address: Option<String>,
}

/// Supported container runtime backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Real LXC instances driven through the `lxc` command line tool.
    Lxc,
    /// In-memory inventory used when no container tool is available.
    Demo,
}

/// Instance entry of `lxc list --format json`. Only the fields we read are modelled.
#[derive(Debug, Deserialize)]
pub(crate) struct LxcInstance {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub state: Option<LxcState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LxcState {
    #[serde(default)]
    pub network: Option<std::collections::HashMap<String, LxcNetwork>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LxcNetwork {
    #[serde(default)]
    pub addresses: Vec<LxcAddress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LxcAddress {
    pub family: String,
    pub address: String,
}

impl From<LxcInstance> for ContainerSummary {
    fn from(instance: LxcInstance) -> Self {
        let ipv4_address = instance
            .state
            .and_then(|state| state.network)
            .and_then(|mut network| network.remove("eth0"))
            .and_then(|eth0| {
                eth0.addresses
                    .into_iter()
                    .find(|addr| addr.family == "inet")
                    .map(|addr| addr.address)
            });

        ContainerSummary {
            name: instance.name,
            status: ContainerStatus::from(instance.status.as_str()),
            ipv4_address,
        }
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,62}$").expect("container name pattern is valid")
    })
}

/// Rejects anything that is not a plain instance name before it reaches a command line.
pub fn validate_container_name(name: &str) -> Result<(), ContainerError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ContainerError::InvalidName(name.to_string()))
    }
}
