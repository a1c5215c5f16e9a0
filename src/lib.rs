pub mod configuration;
pub mod console;
pub mod container_management;
pub mod controller;
pub mod error_handling;
pub mod network;
pub mod session_management;
pub mod web_interface;
