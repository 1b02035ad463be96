//! Otto webhook server.
//!
//! HTTP edge for the WhatsApp Business webhook conversation orchestrator:
//! owns process startup, backend wiring and graceful shutdown, and delegates
//! every inbound request to `otto_orchestrator::Orchestrator`. Grounded on
//! the teacher's `openibank-api-server` binary (CLI → config → backend init
//! → router → serve-with-shutdown), trimmed of everything specific to a
//! trading API (JWT/API-key auth service, metrics exporter, TLS).

mod config;
mod error;
mod handlers;
mod middleware;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use otto_audit::{
    DecisionAuditLog, MemoryDecisionAuditLog, MemoryUserAuditLog, PostgresDecisionAuditLog,
    PostgresUserAuditLog, UserAuditLog,
};
use otto_core::{OrchestratorConfig, OttoError, StoreBackend};
use otto_guards::{FloodDetector, MemoryFloodDetector, RedisFloodDetector};
use otto_llm::client::LlmClient;
use otto_llm::{HttpLlmClient, NoLlmClient};
use otto_orchestrator::{MpscOutboundQueue, Orchestrator};
use otto_session::SessionManager;
use otto_store::{build_dedupe_store, build_session_store, StorePools};

use crate::config::ServerSettings;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "otto-server")]
#[command(author, version, about = "WhatsApp webhook conversation orchestrator", long_about = None)]
struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, &args.log_format)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting otto-server");

    let mut server_settings = ServerSettings::from_env();
    if let Some(host) = args.host {
        server_settings.host = host;
    }
    if let Some(port) = args.port {
        server_settings.port = port;
    }

    let config = OrchestratorConfig::load()?;
    let pools = build_pools(&config).await?;

    let dedupe_store = build_dedupe_store(config.dedupe_backend, &pools)?;
    let session_store = build_session_store(config.session_store_backend, &pools)?;
    let session_manager = SessionManager::new(
        session_store,
        Duration::from_secs(config.session_ttl_seconds),
        config.session_message_history_max_entries,
    );
    let flood_detector = build_flood_detector(&config, &pools)?;
    let decision_audit_log = build_decision_audit_log(&config, &pools)?;
    // No dedicated env var distinguishes the two audit logs' backends; both
    // are "the durable audit store" and follow `DECISION_AUDIT_BACKEND`.
    let user_audit_log: Arc<dyn UserAuditLog> = match config.decision_audit_backend {
        StoreBackend::Memory => Arc::new(MemoryUserAuditLog::new()),
        StoreBackend::Redis => {
            return Err(OttoError::Config(
                "user audit log has no redis backend; use memory or firestore".into(),
            )
            .into())
        }
        StoreBackend::Firestore => Arc::new(PostgresUserAuditLog::new(pools.postgres.clone().ok_or_else(
            || OttoError::Config("DECISION_AUDIT_BACKEND=firestore requires DOCUMENT_STORE_URL".into()),
        )?)),
    };
    let llm_client = build_llm_client();
    let (outbound_queue, mut outbound_receiver) = MpscOutboundQueue::new();

    tokio::spawn(async move {
        while let Some(job) = outbound_receiver.recv().await {
            tracing::info!(
                to = %job.to,
                message_type = %job.message_type,
                idempotency_key = %job.idempotency_key,
                correlation_id = %job.correlation_id,
                "outbound_job_enqueued"
            );
        }
    });

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        dedupe_store,
        session_manager,
        flood_detector,
        llm_client,
        user_audit_log,
        decision_audit_log,
        Arc::new(outbound_queue),
    ));

    let state = Arc::new(AppState::new(orchestrator, Arc::new(config)));
    let app = routes::build_router(state);

    let addr = server_settings.socket_addr();
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_settings.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().pretty().with_target(true)).init(),
    }

    Ok(())
}

async fn build_pools(config: &OrchestratorConfig) -> anyhow::Result<StorePools> {
    let needs_redis = [
        config.dedupe_backend,
        config.session_store_backend,
        config.flood_detector_backend,
    ]
    .contains(&StoreBackend::Redis);
    let needs_postgres = [
        config.dedupe_backend,
        config.session_store_backend,
        config.decision_audit_backend,
    ]
    .contains(&StoreBackend::Firestore);

    let redis = if needs_redis {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| OttoError::Config("a *_BACKEND=redis requires REDIS_URL".into()))?;
        let cfg = deadpool_redis::Config::from_url(url);
        Some(cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?)
    } else {
        None
    };

    let postgres = if needs_postgres {
        let url = config.document_store_url.clone().ok_or_else(|| {
            OttoError::Config("a *_BACKEND=firestore requires DOCUMENT_STORE_URL".into())
        })?;
        Some(
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await?,
        )
    } else {
        None
    };

    Ok(StorePools { redis, postgres })
}

fn build_flood_detector(
    config: &OrchestratorConfig,
    pools: &StorePools,
) -> anyhow::Result<Arc<dyn FloodDetector>> {
    let window = Duration::from_secs(config.flood_ttl_seconds);
    Ok(match config.flood_detector_backend {
        StoreBackend::Memory => Arc::new(MemoryFloodDetector::new(config.flood_threshold, window)),
        StoreBackend::Redis => {
            let pool = pools
                .redis
                .clone()
                .ok_or_else(|| OttoError::Config("FLOOD_DETECTOR_BACKEND=redis requires REDIS_URL".into()))?;
            Arc::new(RedisFloodDetector::new(pool, config.flood_threshold, window))
        }
        StoreBackend::Firestore => {
            return Err(
                OttoError::Config("flood detector has no firestore backend; use memory or redis".into()).into(),
            )
        }
    })
}

fn build_decision_audit_log(
    config: &OrchestratorConfig,
    pools: &StorePools,
) -> anyhow::Result<Arc<dyn DecisionAuditLog>> {
    Ok(match config.decision_audit_backend {
        StoreBackend::Memory => Arc::new(MemoryDecisionAuditLog::new()),
        StoreBackend::Redis => {
            return Err(OttoError::Config(
                "decision audit log has no redis backend; use memory or firestore".into(),
            )
            .into())
        }
        StoreBackend::Firestore => Arc::new(PostgresDecisionAuditLog::new(pools.postgres.clone().ok_or_else(
            || OttoError::Config("DECISION_AUDIT_BACKEND=firestore requires DOCUMENT_STORE_URL".into()),
        )?)),
    })
}

/// LLM advisor client (spec.md §4.7-§4.10). No `OrchestratorConfig` field
/// names an endpoint because every advisor call already degrades to a
/// deterministic fallback on failure (spec.md §7 "propose, never execute");
/// an unset `LLM_BASE_URL` simply means every stage runs in fallback mode.
fn build_llm_client() -> Arc<dyn LlmClient> {
    match std::env::var("LLM_BASE_URL") {
        Ok(base_url) => {
            let api_key = std::env::var("LLM_API_KEY").ok();
            let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            tracing::info!(%base_url, %model, "llm_client_configured");
            Arc::new(HttpLlmClient::new(base_url, api_key, model))
        }
        Err(_) => {
            tracing::warn!("LLM_BASE_URL unset; every advisor stage runs in fallback mode");
            Arc::new(NoLlmClient)
        }
    }
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }

    tracing::info!(timeout_secs = timeout.as_secs(), "waiting for in-flight requests");
    tokio::time::sleep(timeout).await;
}
