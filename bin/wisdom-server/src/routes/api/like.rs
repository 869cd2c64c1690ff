use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::handlers::like;
use crate::middleware::SessionHeader;
use crate::routes::api::ValidatedJson;
use crate::schemas::api::like::{LikeRequest, LikeResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(post_like), components(schemas(LikeRequest, LikeResponse)))]
pub struct LikeApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/like", post(post_like))
}

/// Like a reply (`POST /api/like`). Each session counts once per message.
#[utoipa::path(
    post,
    path = "/api/like",
    tag = "feedback",
    params(("session-id" = String, Header, description = "Client session UUID")),
    request_body = LikeRequest,
    responses(
        (status = 200, description = "Like recorded or already present", body = LikeResponse),
        (status = 400, description = "Missing session-id or invalid body"),
    )
)]
pub async fn post_like(
    State(state): State<Arc<AppState>>,
    SessionHeader(session): SessionHeader,
    ValidatedJson(req): ValidatedJson<LikeRequest>,
) -> Result<Json<LikeResponse>, ServerError> {
    let already_liked = like::like(
        &state,
        session,
        req.message_id,
        req.conversation_id.as_deref(),
        req.message_content.as_deref(),
    )
    .await?;
    Ok(Json(LikeResponse { success: true, already_liked }))
}
