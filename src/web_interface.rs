// Web Interface module root
pub mod console_socket;
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use web_server::WebServer;
