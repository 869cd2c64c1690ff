//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for wisdom-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set. Missing credentials degrade the
/// server (file-backed storage, canned oracle replies) instead of failing.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5002"`).
    pub bind_address: String,

    /// sqlx SQLite URL of the relational store, e.g. `"sqlite://wisdom.db"`.
    /// `None` means every operation goes to the file store.
    pub database_url: Option<String>,

    /// Directory holding the JSON fallback store.
    pub data_dir: PathBuf,

    /// Upper bound for a single relational-store call before falling back.
    pub store_timeout: Duration,

    /// Credential for the completion oracle.
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (no trailing slash).
    pub openai_base_url: String,

    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Upper bound for one oracle call.
    pub oracle_timeout: Duration,

    /// Number of most recent turns sent to the oracle besides the system message.
    pub history_window: usize,

    /// Cached sessions idle for longer than this are evicted.
    pub session_ttl: Duration,

    /// Maximum number of cached sessions.
    pub max_sessions: usize,

    /// An identical resubmission inside this window is treated as a retry.
    pub dedupe_window: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are also written to daily-rolling files in this directory.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated CORS origin allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("WISDOM_BIND", "0.0.0.0:5002"),
            database_url: env_opt("WISDOM_DATABASE_URL"),
            data_dir: PathBuf::from(env_or("WISDOM_DATA_DIR", "./data")),
            store_timeout: Duration::from_millis(parse_env("WISDOM_STORE_TIMEOUT_MS", 2000)),
            openai_api_key: env_opt("WISDOM_OPENAI_API_KEY").or_else(|| env_opt("OPENAI_API_KEY")),
            openai_base_url: env_or("WISDOM_OPENAI_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_owned(),
            model: env_or("WISDOM_MODEL", "gpt-3.5-turbo"),
            temperature: parse_env("WISDOM_TEMPERATURE", 0.8),
            max_tokens: parse_env("WISDOM_MAX_TOKENS", 500),
            oracle_timeout: Duration::from_secs(parse_env("WISDOM_ORACLE_TIMEOUT_SECS", 30)),
            history_window: parse_env("WISDOM_HISTORY_WINDOW", 10),
            session_ttl: Duration::from_secs(parse_env("WISDOM_SESSION_TTL_SECS", 3600)),
            max_sessions: parse_env("WISDOM_MAX_SESSIONS", 10_000),
            dedupe_window: Duration::from_secs(parse_env("WISDOM_DEDUPE_WINDOW_SECS", 30)),
            log_level: env_or("WISDOM_LOG", "info"),
            log_json: parse_bool("WISDOM_LOG_JSON", false),
            log_dir: env_opt("WISDOM_LOG_DIR").map(PathBuf::from),
            cors_allowed_origins: env_opt("WISDOM_CORS_ORIGINS"),
            enable_swagger: parse_bool("WISDOM_ENABLE_SWAGGER", true),
        }
    }
}

impl Default for Config {
    /// Defaults without consulting the environment; used by tests.
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5002".to_owned(),
            database_url: None,
            data_dir: PathBuf::from("./data"),
            store_timeout: Duration::from_millis(2000),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-3.5-turbo".to_owned(),
            temperature: 0.8,
            max_tokens: 500,
            oracle_timeout: Duration::from_secs(30),
            history_window: 10,
            session_ttl: Duration::from_secs(3600),
            max_sessions: 10_000,
            dedupe_window: Duration::from_secs(30),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
