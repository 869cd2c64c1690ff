//! The chat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::handlers::chat::{self, ChatTurn};
use crate::middleware::SessionHeader;
use crate::middleware::auth::IDEMPOTENCY_HEADER;
use crate::routes::api::ValidatedJson;
use crate::schemas::api::chat::{ChatRequest, ChatResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(post_chat), components(schemas(ChatRequest, ChatResponse)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(post_chat))
}

/// Ask a question (`POST /api/chat`).
///
/// Each session may ask three questions. Resubmitting the previous request
/// (same `idempotency-key`, or the same text shortly after) replays its reply
/// without using up a question. Past the limit, a fixed message is returned
/// and the oracle is not called.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    params(
        ("session-id" = String, Header, description = "Client session UUID"),
        ("idempotency-key" = Option<String>, Header, description = "Deduplicates retried submissions"),
    ),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply produced", body = ChatResponse),
        (status = 400, description = "Missing session-id or invalid body"),
        (status = 503, description = "Session state unavailable"),
    )
)]
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    SessionHeader(session): SessionHeader,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ServerError::BadRequest("message must not be blank".into()));
    }
    let turn = ChatTurn {
        session,
        message: message.to_owned(),
        email: req.email.map(|e| e.trim().to_lowercase()),
        name: req.name,
        idempotency_key: headers
            .get(IDEMPOTENCY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    // The turn runs detached so that a client disconnect cannot cut it short
    // between the oracle call and persistence.
    let reply = tokio::spawn(chat::run(state, turn))
        .await
        .map_err(|e| ServerError::Internal(format!("chat turn aborted: {e}")))??;
    Ok(Json(reply.into()))
}
