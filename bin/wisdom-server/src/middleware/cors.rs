use crate::state::AppState;
use axum::http::{HeaderName, HeaderValue};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::auth::{IDEMPOTENCY_HEADER, SESSION_HEADER};

pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        // Wildcard; set WISDOM_CORS_ORIGINS in production.
        CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                HeaderName::from_static(SESSION_HEADER),
                HeaderName::from_static(IDEMPOTENCY_HEADER),
            ])
            .allow_methods(Any)
    }
}
