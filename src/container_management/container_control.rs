use async_trait::async_trait;

use crate::container_management::types::{ContainerSummary, Runtime};
use crate::error_handling::types::ContainerError;

/// The container control service consumed by the gateway.
///
/// The console only needs `list` to check that a target exists and is running; the other
/// operations complete the lifecycle surface of the underlying tool.
#[async_trait]
pub trait ContainerControl: Send + Sync {
    /// Which runtime this service drives.
    fn runtime(&self) -> Runtime;

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError>;

    async fn start(&self, name: &str) -> Result<(), ContainerError>;

    async fn stop(&self, name: &str) -> Result<(), ContainerError>;

    async fn delete(&self, name: &str) -> Result<(), ContainerError>;

    async fn launch(&self, image: &str, name: &str) -> Result<(), ContainerError>;

    /// Looks up a single container by exact name.
    async fn find(&self, name: &str) -> Result<Option<ContainerSummary>, ContainerError> {
        Ok(self.list().await?.into_iter().find(|c| c.name == name))
    }
}
