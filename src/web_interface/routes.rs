use std::convert::Infallible;
use std::sync::Arc;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::console_socket::serve_socket;
use super::types::{ApiError, HealthResponse, SessionResponse};
use crate::container_management::ContainerControl;
use crate::network::gateway::Gateway;
use crate::session_management::SessionRegistry;

fn with_gateway(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = (Arc<Gateway>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

/// WebSocket upgrade on `/` and `/ws`
pub fn console_route(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .or(warp::path!("ws"))
        .unify()
        .and(warp::ws())
        .and(with_gateway(gateway))
        .map(|ws: warp::ws::Ws, gateway: Arc<Gateway>| {
            ws.on_upgrade(move |socket| serve_socket(gateway, socket))
        })
}

/// GET /api/sessions
pub fn list_sessions_route(
    registry: Arc<SessionRegistry>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "sessions")
        .and(warp::get())
        .map(move || {
            let sessions: Vec<SessionResponse> = registry
                .sessions()
                .into_iter()
                .map(SessionResponse::from)
                .collect();
            reply::json(&sessions)
        })
}

/// GET /api/containers
pub fn list_containers_route(
    control: Arc<dyn ContainerControl>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "containers")
        .and(warp::get())
        .and_then(move || {
            let control = control.clone();
            async move {
                match control.list().await {
                    Ok(list) => {
                        Ok::<_, Rejection>(reply::with_status(reply::json(&list), StatusCode::OK))
                    }
                    Err(e) => {
                        log::error!("Failed to list containers: {}", e);
                        Ok::<_, Rejection>(reply::with_status(
                            reply::json(&ApiError {
                                message: "Failed to list containers".to_string(),
                            }),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ))
                    }
                }
            }
        })
}

/// GET /health
pub fn health_route(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_gateway(gateway))
        .map(|gateway: Arc<Gateway>| {
            reply::json(&HealthResponse {
                status: "ok",
                mode: gateway.mode(),
                runtime: gateway.control().runtime(),
                sessions: gateway.registry().len(),
                max_sessions: gateway.registry().max_sessions(),
            })
        })
}
