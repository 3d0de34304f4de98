//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::applogs::retention;
use crate::cache::rate_limit::Decision;
use crate::deploy::registry::NewApp;
use crate::errors::PlatformError;
use crate::events::Topics;
use crate::models::application::Repository;
use crate::models::log::LogSource;
use crate::server::error::ApiError;
use crate::server::state::ServerState;
use crate::store::AppFilter;
use crate::telemetry::collect_daemon_metrics;
use crate::utils::{generate_uuid, version_info};

/// Caller identity, set by the fronting dashboard
pub const USER_HEADER: &str = "x-user-id";

/// Source-control token forwarded for clone and commit lookups
pub const TOKEN_HEADER: &str = "x-scm-token";

/// Default page size for application logs
const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest accepted page size for application logs
const MAX_PAGE_SIZE: usize = 500;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    header_str(headers, USER_HEADER)
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", USER_HEADER)))
}

fn token(headers: &HeaderMap) -> Option<SecretString> {
    header_str(headers, TOKEN_HEADER).map(|t| SecretString::from(t.to_string()))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployd".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Metrics handler
pub async fn metrics_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics =
        collect_daemon_metrics(state.store.as_ref(), state.broadcaster.topic_count()).await?;
    Ok(Json(metrics))
}

/// List applications, scoped to the caller when the user header is set
pub async fn list_apps_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let apps = match header_str(&headers, USER_HEADER) {
        Some(user_id) => state.registry.list_for_user(user_id).await?,
        None => state.store.list_apps(&AppFilter::new()).await?,
    };
    Ok(Json(apps))
}

/// Registration request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    pub name: String,
    pub start_command: String,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Full repository reference
    #[serde(default)]
    pub repository: Option<Repository>,

    /// Or `owner` and `repo`, resolved through source control
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Register an application
pub async fn create_app_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAppRequest>,
) -> Result<Response, ApiError> {
    let user_id = user_id(&headers)?;

    let placeholder = Repository {
        name: String::new(),
        full_name: String::new(),
        owner: String::new(),
        html_url: String::new(),
        clone_url: String::new(),
        branch: body.branch.clone().unwrap_or_default(),
        last_commit: None,
    };

    let mut request = NewApp {
        user_id,
        name: body.name,
        repository: placeholder,
        start_command: body.start_command,
        build_command: body.build_command,
        environment: body.environment,
    };

    let app = match (body.repository, body.owner, body.repo) {
        (Some(repository), _, _) => {
            request.repository = repository;
            state.registry.register_app(request).await?
        }
        (None, Some(owner), Some(repo)) => {
            let token = require_token(&headers)?;
            state
                .registry
                .register_from_source(&token, &owner, &repo, request)
                .await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "either repository or owner and repo is required".to_string(),
            ))
        }
    };

    Ok((StatusCode::CREATED, Json(app)).into_response())
}

/// Get one application
pub async fn get_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state
        .store
        .get_app(&app_id)
        .await?
        .ok_or_else(|| PlatformError::NotFound(format!("app {}", app_id)))?;
    Ok(Json(app))
}

/// Start a deployment in the background
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user_id = user_id(&headers)?;
    let ack = state
        .orchestrator
        .request_deploy(&app_id, &user_id, token(&headers))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ack)).into_response())
}

/// Stop an application
pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.stop(&app_id).await?))
}

/// Restart an application
pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.restart(&app_id).await?))
}

/// Delete an application
pub async fn delete_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete(&app_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Log page query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Read one stream instead of the merged view
    pub stream: Option<LogSource>,
}

/// Paginated application logs, rate limited per user
pub async fn app_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    Query(query): Query<LogsQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user_id = user_id(&headers)?;
    if let Decision::Limited(retry_after) = state.log_limiter.check(&user_id) {
        debug!("Log read by {} rate limited", user_id);
        return Err(ApiError::RateLimited(retry_after));
    }

    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    if let Some(source) = query.stream {
        let page = state
            .orchestrator
            .stream_logs(&app_id, source, page, page_size)
            .await?;
        return Ok(Json(page).into_response());
    }

    let logs = state.orchestrator.app_logs(&app_id, page, page_size).await?;
    Ok(Json(logs).into_response())
}

/// Size and line counts of the application's log files
pub async fn log_stats_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.log_stats(&app_id).await?))
}

/// Attempts listing query
#[derive(Debug, Deserialize)]
pub struct AttemptsQuery {
    pub limit: Option<usize>,
}

/// Most recent deployment attempts of an application
pub async fn attempts_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    Query(query): Query<AttemptsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let attempts = state
        .orchestrator
        .recent_attempts(&app_id, query.limit)
        .await?;
    Ok(Json(attempts))
}

/// One deployment attempt with its logs
pub async fn attempt_handler(
    State(state): State<Arc<ServerState>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.attempt(&attempt_id).await?))
}

fn require_token(headers: &HeaderMap) -> Result<SecretString, ApiError> {
    token(headers).ok_or_else(|| ApiError::BadRequest(format!("missing {} header", TOKEN_HEADER)))
}

/// Branches of an application's repository
pub async fn branches_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = require_token(&headers)?;
    Ok(Json(state.registry.branches(&token, &app_id).await?))
}

/// Compare the deployed commit with the branch head
pub async fn commit_check_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = require_token(&headers)?;
    Ok(Json(state.registry.check_commits(&token, &app_id).await?))
}

/// Assigned subdomains
pub async fn subdomains_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.allocator.active_subdomains().await?))
}

/// Reserved subdomain words
pub async fn reserved_subdomains_handler(
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    Json(state.allocator.reserved_subdomains())
}

/// Count response for maintenance operations
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Give a subdomain to every application lacking one
pub async fn assign_subdomains_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.registry.assign_missing_subdomains().await?;
    Ok(Json(CountResponse { count }))
}

/// Run the log retention sweep now
pub async fn cleanup_logs_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    let count = retention::sweep(&state.logs_dir, state.retention_max_age).await?;
    Ok(Json(CountResponse { count }))
}

/// Subscribe to a topic over a WebSocket
pub async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if !Topics::is_valid(&topic) {
        return Err(ApiError::BadRequest(format!("unknown topic '{}'", topic)));
    }
    let user_id = header_str(&headers, USER_HEADER).map(str::to_string);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, topic, user_id)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<ServerState>,
    topic: String,
    user_id: Option<String>,
) {
    let connection_id = generate_uuid();
    if let Some(user_id) = &user_id {
        state.broadcaster.register_connection(&connection_id, user_id);
    }
    info!("Subscriber {} joined {}", connection_id, topic);

    let mut events = state.broadcaster.subscribe(&topic);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber {} lagged, {} event(s) dropped", connection_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize {} event: {}", event.name(), e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(events);
    state.broadcaster.unregister_connection(&connection_id);
    state.broadcaster.prune();
    info!("Subscriber {} left {}", connection_id, topic);
}
