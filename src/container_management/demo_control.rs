use async_trait::async_trait;
use log::info;
use std::sync::Mutex;

use crate::container_management::container_control::ContainerControl;
use crate::container_management::types::{
    validate_container_name, ContainerStatus, ContainerSummary, Runtime,
};
use crate::error_handling::types::ContainerError;

/// In-memory container inventory used when no container tool is installed.
///
/// Seeded with one running and one stopped container so that the console can be exercised
/// end to end. Lifecycle operations mutate the inventory instead of touching the host.
pub struct DemoControl {
    containers: Mutex<Vec<ContainerSummary>>,
}

impl DemoControl {
    pub fn new() -> Self {
        Self::with_containers(vec![
            ContainerSummary {
                name: "demo-ubuntu".to_string(),
                status: ContainerStatus::Running,
                ipv4_address: Some("10.0.0.50".to_string()),
            },
            ContainerSummary {
                name: "demo-centos".to_string(),
                status: ContainerStatus::Stopped,
                ipv4_address: None,
            },
        ])
    }

    pub fn with_containers(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers: Mutex::new(containers),
        }
    }

    fn set_status(&self, name: &str, status: ContainerStatus) -> Result<(), ContainerError> {
        let mut containers = self.containers.lock().unwrap_or_else(|e| e.into_inner());
        let container = containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        if !status.is_running() {
            container.ipv4_address = None;
        }
        container.status = status;
        Ok(())
    }
}

impl Default for DemoControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerControl for DemoControl {
    fn runtime(&self) -> Runtime {
        Runtime::Demo
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        Ok(self
            .containers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn start(&self, name: &str) -> Result<(), ContainerError> {
        self.set_status(name, ContainerStatus::Running)?;
        info!("Container {} started successfully (demo mode)", name);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), ContainerError> {
        self.set_status(name, ContainerStatus::Stopped)?;
        info!("Container {} stopped successfully (demo mode)", name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ContainerError> {
        let mut containers = self.containers.lock().unwrap_or_else(|e| e.into_inner());
        let before = containers.len();
        containers.retain(|c| c.name != name);
        if containers.len() == before {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        info!("Container {} deleted successfully (demo mode)", name);
        Ok(())
    }

    async fn launch(&self, image: &str, name: &str) -> Result<(), ContainerError> {
        validate_container_name(name)?;
        let mut containers = self.containers.lock().unwrap_or_else(|e| e.into_inner());
        if containers.iter().any(|c| c.name == name) {
            return Err(ContainerError::CommandFailed(format!(
                "Container {} already exists",
                name
            )));
        }
        containers.push(ContainerSummary {
            name: name.to_string(),
            status: ContainerStatus::Running,
            ipv4_address: None,
        });
        info!("Container {} created from {} (demo mode)", name, image);
        Ok(())
    }
}
