use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::UserStore;
use crate::error::ServerError;
use crate::handlers::account;
use crate::middleware::AuthUser;
use crate::routes::api::ValidatedJson;
use crate::schemas::api::account::{ProfileResponse, ProfileView, RegisterRequest, RegisterResponse, UserView};
use crate::session::SessionId;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(register, profile),
    components(schemas(RegisterRequest, RegisterResponse, UserView, ProfileResponse, ProfileView))
)]
pub struct AccountApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/profile", get(profile))
}

/// Register or update a user (`POST /api/register`).
///
/// Links `sessionId`, if given, to the user without touching its history.
/// The returned token is the bearer credential for the account endpoints.
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "account",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid e-mail or session id"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServerError> {
    let session = req
        .session_id
        .as_deref()
        .map(|raw| SessionId::parse(raw).ok_or_else(|| ServerError::BadRequest("sessionId must be a UUID".into())))
        .transpose()?;
    let (user, token) = account::register(&state, &req.email, req.name.as_deref(), session).await?;
    Ok(Json(RegisterResponse { success: true, user: user.into(), token }))
}

/// The caller's profile and activity totals (`GET /api/profile`).
#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "account",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileResponse>, ServerError> {
    let stats = state.store.user_stats(&user.id).await?;
    Ok(Json(ProfileResponse { success: true, user: ProfileView::new(user, stats) }))
}
