use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::AnalyticsStore;
use crate::error::ServerError;
use crate::schemas::api::wisdom::{PopularMessageView, PopularQuery, PopularWisdomResponse};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 10;

#[derive(OpenApi)]
#[openapi(paths(popular_wisdom), components(schemas(PopularWisdomResponse, PopularMessageView)))]
pub struct WisdomApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/popular-wisdom", get(popular_wisdom))
}

/// Most liked replies (`GET /api/popular-wisdom`).
#[utoipa::path(
    get,
    path = "/api/popular-wisdom",
    tag = "wisdom",
    params(PopularQuery),
    responses(
        (status = 200, description = "Replies ordered by like count", body = PopularWisdomResponse),
        (status = 400, description = "limit outside 1..=50"),
    )
)]
pub async fn popular_wisdom(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PopularQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<PopularWisdomResponse>, ServerError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    query.validate()?;
    let popular = state.store.popular_messages(query.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(PopularWisdomResponse {
        success: true,
        messages: popular.into_iter().map(PopularMessageView::from).collect(),
    }))
}
