//! Shell backends a console session can drive.
//!
//! - [`ProcessAdapter`]: a real interactive shell running inside a container.
//! - [`DemoEmulator`]: a protocol-compatible stand-in with no OS resources.
//!
//! Both implement [`ShellBackend`]; a [`ShellLauncher`] picks one variant per gateway, so
//! sessions never look at the mode after creation.

pub mod backend;
pub mod demo_emulator;
pub mod launcher;
pub mod process_adapter;

pub use backend::{BackendEvent, EventSender, ShellBackend, ShellLauncher};
pub use demo_emulator::DemoEmulator;
pub use launcher::{DemoShellLauncher, LxcShellLauncher};
pub use process_adapter::{ProcessAdapter, ShellCommand};
