use log::info;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use warp::Filter;

use super::routes::{console_route, health_route, list_containers_route, list_sessions_route};
use crate::error_handling::types::WebError;
use crate::network::gateway::Gateway;

/// Web server for the console socket, the JSON API and the static frontend
pub struct WebServer {
    gateway: Arc<Gateway>,
    static_dir: Option<PathBuf>,
}

impl WebServer {
    pub fn new(gateway: Arc<Gateway>, static_dir: Option<PathBuf>) -> Self {
        Self {
            gateway,
            static_dir,
        }
    }

    /// Serves until the surrounding task is cancelled.
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(WebError::MissingStaticDir(dir.display().to_string()));
            }
        }

        // A taken port is reported here instead of inside the server task.
        TcpListener::bind(addr)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;

        let api = console_route(self.gateway.clone())
            .or(list_sessions_route(self.gateway.registry().clone()))
            .or(list_containers_route(self.gateway.control().clone()))
            .or(health_route(self.gateway.clone()));

        info!("Web server listening on http://{}", addr);

        match &self.static_dir {
            Some(dir) => {
                info!("Serving static files from {}", dir.display());
                let routes = api
                    .or(warp::fs::dir(dir.clone()))
                    .with(warp::log("shellgate::web"));
                warp::serve(routes).run(addr).await;
            }
            None => {
                let routes = api.with(warp::log("shellgate::web"));
                warp::serve(routes).run(addr).await;
            }
        }

        Ok(())
    }
}
