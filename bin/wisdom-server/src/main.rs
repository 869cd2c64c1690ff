//! wisdom-server – entry point.
//!
//! Startup order:
//! 1. Load `.env`, parse command-line overrides and environment configuration.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the file store and, when configured, the relational store.
//! 4. Build the completion oracle client.
//! 5. Start the session-cache sweeper.
//! 6. Build the Axum router and start the HTTP server with graceful shutdown.

mod cache;
mod config;
mod entities;
mod error;
mod handlers;
mod language;
mod middleware;
mod oracle;
mod prompt;
mod routes;
mod schemas;
mod session;
mod state;
mod tracker;
mod wisdom;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::Config;
use crate::entities::{FileStore, ResilientStore, SqlStore};
use crate::oracle::{OpenAiOracle, OracleClient};
use crate::state::AppState;

/// How often idle sessions are swept from the cache.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Command-line overrides; everything else comes from `WISDOM_*` variables.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind, e.g. `0.0.0.0:5002`.
    #[arg(long)]
    bind: Option<String>,

    /// sqlx SQLite URL of the relational store.
    #[arg(long)]
    database_url: Option<String>,

    /// Directory of the JSON fallback store.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(bind) = cli.bind {
        cfg.bind_address = bind;
    }
    if let Some(url) = cli.database_url {
        cfg.database_url = Some(url);
    }
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "wisdom-server starting");

    // ── 3. Stores ──────────────────────────────────────────────────────────────
    let files = FileStore::open(&cfg.data_dir).await?;
    let sql = match cfg.database_url.as_deref() {
        Some(url) => match SqlStore::connect(url).await {
            Ok(store) => {
                info!(database_url = %url, "relational store ready");
                Some(store)
            }
            Err(e) => {
                warn!(database_url = %url, error = %e, "relational store unavailable; using file store only");
                None
            }
        },
        None => {
            warn!("WISDOM_DATABASE_URL not set; using file store only");
            None
        }
    };
    let store = ResilientStore::new(sql, files, cfg.store_timeout);

    // ── 4. Completion oracle ───────────────────────────────────────────────────
    let openai = OpenAiOracle::from_config(&cfg)?;
    if !openai.is_configured() {
        warn!("no OpenAI API key configured; every reply will be the fallback text");
    }
    let oracle = OracleClient::new(Arc::new(openai), cfg.oracle_timeout, cfg.history_window);

    // ── 5. Shared application state ────────────────────────────────────────────
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::new(cfg, store, oracle));
    let sweeper = Arc::clone(&state.sessions).spawn_sweeper(SWEEP_INTERVAL);

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("wisdom-server stopped");
    Ok(())
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file on drop and must live until exit.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Warn loudly if the configured value is not a valid tracing filter.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: WISDOM_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout = if cfg.log_json {
        fmt::layer().json().with_target(true).with_thread_ids(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    let (file, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wisdom-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .with(file)
        .init();
    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c    => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
