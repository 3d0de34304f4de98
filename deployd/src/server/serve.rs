//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::PlatformError;
use crate::server::handlers::{
    app_logs_handler, assign_subdomains_handler, attempt_handler, attempts_handler,
    branches_handler, cleanup_logs_handler, commit_check_handler, create_app_handler, delete_app_handler, deploy_handler,
    get_app_handler, health_handler, list_apps_handler, log_stats_handler, metrics_handler,
    reserved_subdomains_handler, restart_handler, stop_handler, subdomains_handler,
    version_handler, ws_handler,
};
use crate::server::state::ServerState;

/// Control API routes
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/metrics", get(metrics_handler))
        // Applications
        .route("/apps", get(list_apps_handler).post(create_app_handler))
        .route("/apps/{id}", get(get_app_handler).delete(delete_app_handler))
        .route("/apps/{id}/deploy", post(deploy_handler))
        .route("/apps/{id}/stop", post(stop_handler))
        .route("/apps/{id}/restart", post(restart_handler))
        .route("/apps/{id}/logs", get(app_logs_handler))
        .route("/apps/{id}/logs/stats", get(log_stats_handler))
        .route("/apps/{id}/deployments", get(attempts_handler))
        .route("/apps/{id}/branches", get(branches_handler))
        .route("/apps/{id}/commits/check", get(commit_check_handler))
        .route("/deployments/{id}", get(attempt_handler))
        // Subdomains
        .route("/subdomains", get(subdomains_handler))
        .route("/subdomains/reserved", get(reserved_subdomains_handler))
        .route("/subdomains/assign", post(assign_subdomains_handler))
        // Maintenance
        .route("/logs/cleanup", post(cleanup_logs_handler))
        // Events
        .route("/ws/{topic}", get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), PlatformError>>, PlatformError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| PlatformError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| PlatformError::ServerError(e.to_string()))
    });

    Ok(handle)
}
