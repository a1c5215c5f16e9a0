use async_trait::async_trait;
use log::{debug, error, info};
use std::process::Stdio;
use tokio::process::Command;

use crate::container_management::container_control::ContainerControl;
use crate::container_management::types::{
    validate_container_name, ContainerSummary, LxcInstance, Runtime,
};
use crate::error_handling::types::ContainerError;

/// Container control backed by the `lxc` command line tool.
///
/// Every operation runs one `lxc` invocation and collects its output. A non-zero exit status
/// is reported as [`ContainerError::CommandFailed`] carrying the tool's stderr.
pub struct LxcControl {
    binary: String,
}

impl LxcControl {
    /// Creates a new `LxcControl`.
    ///
    /// Returns an error if the tool cannot be executed on this host.
    pub async fn new(binary: impl Into<String>) -> Result<Self, ContainerError> {
        let binary = binary.into();
        info!("Initializing LxcControl with binary: {}", binary);

        if !Self::is_runtime_available(&binary).await {
            error!("{} runtime is not available on this system", binary);
            return Err(ContainerError::RuntimeNotAvailable);
        }

        Ok(Self { binary })
    }

    /// Checks whether `<binary> --version` runs and exits successfully.
    pub async fn is_runtime_available(binary: &str) -> bool {
        let available = Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);

        debug!("{} availability check: {}", binary, available);
        available
    }

    /// Runs `lxc <command> <args..>` and returns its trimmed stdout.
    async fn execute(&self, command: &str, args: &[&str]) -> Result<String, ContainerError> {
        debug!("Executing {} {} {:?}", self.binary, command, args);

        let output = Command::new(&self.binary)
            .arg(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} {} failed: {}", self.binary, command, stderr);
            Err(ContainerError::CommandFailed(stderr))
        }
    }
}

/// Parses the output of `lxc list --format json`.
pub fn parse_container_list(raw: &str) -> Result<Vec<ContainerSummary>, ContainerError> {
    let instances: Vec<LxcInstance> =
        serde_json::from_str(raw).map_err(|e| ContainerError::ParseError(e.to_string()))?;
    Ok(instances.into_iter().map(ContainerSummary::from).collect())
}

#[async_trait]
impl ContainerControl for LxcControl {
    fn runtime(&self) -> Runtime {
        Runtime::Lxc
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        let raw = self.execute("list", &["--format", "json"]).await?;
        let containers = parse_container_list(&raw)?;
        debug!("Listed {} containers", containers.len());
        Ok(containers)
    }

    async fn start(&self, name: &str) -> Result<(), ContainerError> {
        validate_container_name(name)?;
        self.execute("start", &[name]).await?;
        info!("Container {} started", name);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), ContainerError> {
        validate_container_name(name)?;
        self.execute("stop", &[name]).await?;
        info!("Container {} stopped", name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ContainerError> {
        validate_container_name(name)?;
        self.execute("delete", &[name]).await?;
        info!("Container {} deleted", name);
        Ok(())
    }

    async fn launch(&self, image: &str, name: &str) -> Result<(), ContainerError> {
        validate_container_name(name)?;
        if image.is_empty() || image.starts_with('-') {
            return Err(ContainerError::CommandFailed(format!(
                "refusing to launch image {:?}",
                image
            )));
        }
        self.execute("launch", &[image, name]).await?;
        info!("Container {} launched from {}", name, image);
        Ok(())
    }
}
