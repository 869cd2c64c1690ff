//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::cache::SessionCache;
use crate::config::Config;
use crate::entities::ResilientStore;
use crate::oracle::OracleClient;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persisted users, conversations, messages and analytics.
    pub store: Arc<ResilientStore>,
    /// Per-session conversation state.
    pub sessions: Arc<SessionCache>,
    /// Completion oracle with timeout and fallback applied.
    pub oracle: OracleClient,
}

impl AppState {
    pub fn new(config: Config, store: ResilientStore, oracle: OracleClient) -> Self {
        let sessions = SessionCache::new(config.session_ttl, config.max_sessions);
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            sessions: Arc::new(sessions),
            oracle,
        }
    }
}
