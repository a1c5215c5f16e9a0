//! Container management subsystem.
//!
//! The console gateway treats the container tool as an opaque service: it only asks which
//! containers exist and whether they are running before it spawns a shell inside one. This
//! module exposes that service as the [`ContainerControl`] trait with two implementations:
//!
//! - [`LxcControl`]: drives the `lxc` command line tool.
//! - [`DemoControl`]: in-memory inventory used when the tool is not installed.
//!
//! Example (non-running):
//! ```ignore
//! use shellgate::container_management::{ContainerControl, DemoControl};
//!
//! let control = DemoControl::new();
//! let containers = control.list().await?;
//! println!("known containers: {}", containers.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container_control;
pub mod demo_control;
pub mod lxc_control;
pub mod types;

pub use container_control::ContainerControl;
pub use demo_control::DemoControl;
pub use lxc_control::LxcControl;
pub use types::{validate_container_name, ContainerStatus, ContainerSummary, Runtime};
