//! Request identity: the `session-id` header and bearer tokens.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::session::SessionId;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "session-id";
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// A fresh opaque access token (256 random bits, base64url).
pub fn issue_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The form a token is stored in.
pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// The caller's session, taken from the required `session-id` header.
#[derive(Debug, Clone, Copy)]
pub struct SessionHeader(pub SessionId);

impl<S: Send + Sync> FromRequestParts<S> for SessionHeader {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SESSION_HEADER)
            .ok_or_else(|| ServerError::BadRequest(format!("{SESSION_HEADER} header is required")))?;
        raw.to_str()
            .ok()
            .and_then(SessionId::parse)
            .map(SessionHeader)
            .ok_or_else(|| ServerError::BadRequest(format!("{SESSION_HEADER} header must be a UUID")))
    }
}

/// A registered user authenticated by `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServerError::Unauthorized("bearer token required".into()))?;

        state
            .store
            .user_by_token_hash(&token_digest(token))
            .await?
            .map(AuthUser)
            .ok_or_else(|| ServerError::Unauthorized("invalid or expired token".into()))
    }
}
