use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chatsync_common::{
    Error as CommonError, ErrorResponse, HealthResponse, HealthStatus, Message,
    PostMessageRequest,
};
use chatsync_config::ConfigLoader;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


#[derive(Clone)]
struct AppState {
    conversations: Arc<RwLock<HashMap<String, Vec<Message>>>>,
    start_time: SystemTime,
}

impl AppState {
    fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            start_time: SystemTime::now(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: CommonError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&err)))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Json<Vec<Message>> {
    let conversations = state.conversations.read().await;
    Json(conversations.get(&chat_id).cloned().unwrap_or_default())
}

async fn post_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if let Err(e) = request.validate() {
        warn!("Rejected message for {}: {}", chat_id, e);
        return Err(api_error(e));
    }

    let message = Message::from(request);
    let mut conversations = state.conversations.write().await;
    let messages = conversations.entry(chat_id.clone()).or_default();

    // Re-posting a known id is acknowledged without duplicating it
    if let Some(existing) = messages.iter().find(|m| m.id == message.id) {
        return Ok((StatusCode::OK, Json(existing.clone())));
    }

    info!("Stored message {} in {}", message.id, chat_id);
    messages.push(message.clone());
    Ok((StatusCode::CREATED, Json(message)))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed()
        .unwrap_or_default()
        .as_secs();

    Json(HealthResponse {
        status: HealthStatus::Healthy,
        conversations: state.conversations.read().await.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
    })
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api": "ChatSync Mock Remote",
    }))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/chats/{chat_id}/messages", get(list_messages).post(post_message))
        .route("/healthz", get(health_check))
        .route("/version", get(version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting ChatSync mock remote");

    // Load configuration
    let config_path = std::env::var("CHATSYNC_CONFIG").ok().map(PathBuf::from);
    let config = ConfigLoader::load(config_path.as_ref())?;

    let app = router(AppState::new());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
