//! HTTP API module for kyonrun.
//!
//! Exposes ad-hoc and registered script execution plus a few read-only
//! endpoints for inspecting the registry and the script table.

mod errors;
mod handlers;
mod responses;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{ApiState, ModeQuery, RunForm};
pub use responses::*;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerSection;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Served for any path no API route matches.
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ServerSection::default())
    }
}

impl From<&ServerSection> for ApiConfig {
    fn from(server: &ServerSection) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            static_dir: server.static_dir.clone(),
        }
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/slots", get(handlers::list_slots))
        .route("/api/scripts", get(handlers::list_scripts))
        .route("/api/scripts/reload", post(handlers::reload_scripts))
        // Execution
        .route("/run", post(handlers::run_adhoc))
        .route("/scripts/{id}", get(handlers::run_script));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and start serving until `shutdown` resolves.
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_server<F>(
    config: ApiConfig,
    state: ApiState,
    shutdown: F,
) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state, config.static_dir.clone());

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!("API server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((addr, handle))
}
