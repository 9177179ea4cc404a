use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_core::directory::ConversationSummary;
use courier_core::groups::GroupDetails;
use courier_core::{Conversation, Messaging, Principal};
use courier_store::{DirectChat, Group, GroupMembership, Message};

use crate::auth::{Authenticated, TokenVerifier};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub messaging: Messaging,
    pub tokens: Arc<TokenVerifier>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Direct chats
        .route("/api/chats", post(open_chat).get(list_conversations))
        .route("/api/chats/{chat_id}", get(get_chat).delete(delete_chat))
        .route(
            "/api/chats/{chat_id}/messages",
            post(send_chat_message).get(fetch_chat_messages),
        )
        .route(
            "/api/chats/{chat_id}/messages/{message_id}",
            delete(delete_chat_message),
        )
        // Groups
        .route("/api/groups", post(create_group).get(list_groups))
        .route("/api/groups/{group_id}", get(get_group).delete(delete_group))
        .route("/api/groups/{group_id}/members", post(add_member))
        .route(
            "/api/groups/{group_id}/members/{member_id}",
            delete(remove_member),
        )
        .route(
            "/api/groups/{group_id}/messages",
            post(send_group_message).get(fetch_group_messages),
        )
        .route(
            "/api/groups/{group_id}/messages/{message_id}",
            delete(delete_group_message),
        )
        // Streaming sessions
        .route("/api/ws/directory", get(ws::directory_socket))
        .route("/api/ws/chats/{chat_id}/send", get(ws::chat_send_socket))
        .route("/api/ws/chats/{chat_id}/fetch", get(ws::chat_fetch_socket))
        .route("/api/ws/groups/{group_id}/send", get(ws::group_send_socket))
        .route("/api/ws/groups/{group_id}/fetch", get(ws::group_fetch_socket))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct PeerRequest {
    id: u64,
}

#[derive(Deserialize)]
struct SendRequest {
    content: String,
}

#[derive(Deserialize)]
struct FetchQuery {
    count: Option<usize>,
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
    #[serde(default)]
    description: String,
}

/// Run a storage-bound operation off the async workers.
async fn run<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Messaging) -> courier_core::error::Result<T> + Send + 'static,
{
    let messaging = state.messaging.clone();
    tokio::task::spawn_blocking(move || op(&messaging))
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
        .map_err(ApiError::from)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Direct chats
// ---------------------------------------------------------------------------

async fn open_chat(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(req): Json<PeerRequest>,
) -> Result<(StatusCode, Json<DirectChat>), ApiError> {
    let chat = run(&state, move |m| m.chats.open(principal, req.id)).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn list_conversations(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let summaries = run(&state, move |m| m.directory.list_conversations(principal)).await?;
    if summaries.is_empty() {
        return Err(ApiError::NoConversations);
    }
    Ok(Json(summaries))
}

async fn get_chat(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
) -> Result<Json<DirectChat>, ApiError> {
    run(&state, move |m| m.chats.get(principal, chat_id)).await.map(Json)
}

async fn delete_chat(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    run(&state, move |m| m.chats.delete(principal, chat_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_chat_message(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    send_message(&state, principal, Conversation::direct(chat_id), req).await
}

async fn fetch_chat_messages(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    fetch_messages(&state, principal, Conversation::direct(chat_id), query).await
}

async fn delete_chat_message(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path((chat_id, message_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    delete_message(&state, principal, Conversation::direct(chat_id), message_id).await
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

async fn create_group(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = run(&state, move |m| {
        m.groups.create(principal, &req.name, &req.description)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_groups(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<Group>>, ApiError> {
    run(&state, move |m| m.directory.groups_of(principal)).await.map(Json)
}

async fn get_group(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
) -> Result<Json<GroupDetails>, ApiError> {
    run(&state, move |m| m.groups.get(principal, group_id)).await.map(Json)
}

async fn delete_group(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    run(&state, move |m| m.groups.delete(principal, group_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_member(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
    Json(req): Json<PeerRequest>,
) -> Result<(StatusCode, Json<GroupMembership>), ApiError> {
    let membership = run(&state, move |m| m.groups.add_member(principal, group_id, req.id)).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

async fn remove_member(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path((group_id, member_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    run(&state, move |m| m.groups.remove_member(principal, group_id, member_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_group_message(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    send_message(&state, principal, Conversation::group(group_id), req).await
}

async fn fetch_group_messages(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    fetch_messages(&state, principal, Conversation::group(group_id), query).await
}

async fn delete_group_message(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path((group_id, message_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    delete_message(&state, principal, Conversation::group(group_id), message_id).await
}

// ---------------------------------------------------------------------------
// Shared message handlers
// ---------------------------------------------------------------------------

async fn send_message(
    state: &AppState,
    principal: Principal,
    conversation: Conversation,
    req: SendRequest,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = run(state, move |m| m.ledger.send(principal, conversation, &req.content)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn fetch_messages(
    state: &AppState,
    principal: Principal,
    conversation: Conversation,
    query: FetchQuery,
) -> Result<Json<Vec<Message>>, ApiError> {
    let count = query
        .count
        .ok_or_else(|| ApiError::BadRequest("count is required".into()))?;
    run(state, move |m| m.ledger.fetch_recent(principal, conversation, count))
        .await
        .map(Json)
}

async fn delete_message(
    state: &AppState,
    principal: Principal,
    conversation: Conversation,
    message_id: u64,
) -> Result<StatusCode, ApiError> {
    run(state, move |m| m.ledger.delete(principal, conversation, message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
