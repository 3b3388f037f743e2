use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, Method},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use veil_engine::{ChatEngine, ChatView, InboxEntry, MessageView, Page};
use veil_shared::constants::MAX_MESSAGE_LEN;
use veil_shared::types::{ChatId, MessageId, UserId};
use veil_store::Message;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::throttle::SendThrottle;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub throttle: SendThrottle,
    pub config: Arc<ServerConfig>,
    pub reveal_threshold: u32,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/chats", post(start_chat).get(list_chats))
        .route("/chats/:id", get(get_chat))
        .route("/chats/:id/messages", post(send_message).get(list_messages))
        .route("/chats/:id/reveal/request", post(request_reveal))
        .route("/chats/:id/reveal/accept", post(accept_reveal))
        .route("/chats/:id/reveal/decline", post(decline_reveal))
        .route("/chats/:id/read", post(mark_read))
        .route("/messages/:id", delete(delete_message))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated caller. The upstream gateway terminates sessions and
/// forwards the verified user id in this header.
fn caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(UserId)
        .ok_or(ApiError::Unauthenticated)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    reveal_threshold: u32,
}

#[derive(Deserialize)]
struct StartChatRequest {
    partner_id: Uuid,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
}

#[derive(Deserialize)]
struct MarkReadRequest {
    at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PageQuery {
    cursor: Option<String>,
    limit: Option<u32>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        reveal_threshold: state.reveal_threshold,
    })
}

async fn start_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartChatRequest>,
) -> Result<Json<ChatView>, ApiError> {
    let user = caller(&headers)?;
    let view = state.engine.start_chat(user, UserId(req.partner_id)).await?;
    Ok(Json(view))
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<InboxEntry>>, ApiError> {
    let user = caller(&headers)?;
    let inbox = state
        .engine
        .list_chats(user, page.cursor.as_deref(), page.limit)
        .await?;
    Ok(Json(inbox))
}

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChatView>, ApiError> {
    let user = caller(&headers)?;
    let view = state.engine.get_chat(ChatId(id), user).await?;
    Ok(Json(view))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let sender = caller(&headers)?;

    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest(
            "Message content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest(format!(
            "Message content exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }

    if !state.throttle.check(sender).await {
        return Err(ApiError::RateLimited);
    }

    let message = state.engine.send_message(ChatId(id), sender, content).await?;

    info!(chat = %id, message = %message.id, "Message sent");
    Ok(Json(message))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<MessageView>>, ApiError> {
    let viewer = caller(&headers)?;
    let transcript = state
        .engine
        .list_messages(ChatId(id), viewer, page.cursor.as_deref(), page.limit)
        .await?;
    Ok(Json(transcript))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = caller(&headers)?;
    state.engine.delete_message(MessageId(id), user).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn request_reveal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChatView>, ApiError> {
    let user = caller(&headers)?;
    let view = state.engine.request_reveal(ChatId(id), user).await?;
    Ok(Json(view))
}

async fn accept_reveal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChatView>, ApiError> {
    let user = caller(&headers)?;
    let view = state.engine.accept_reveal(ChatId(id), user).await?;
    Ok(Json(view))
}

async fn decline_reveal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChatView>, ApiError> {
    let user = caller(&headers)?;
    let view = state.engine.decline_reveal(ChatId(id), user).await?;
    Ok(Json(view))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<MarkReadRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = caller(&headers)?;
    let at = body.and_then(|Json(req)| req.at);
    state.engine.mark_read(ChatId(id), user, at).await?;
    Ok(Json(serde_json::json!({ "marked": true })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
