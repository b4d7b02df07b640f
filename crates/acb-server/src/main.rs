//! ACB Protocol ledger server
//!
//! Serves the lending ledger over HTTP/JSON. State is replayed from the
//! journal at startup when `ACB_JOURNAL_PATH` is set.

use acb_common::{Clock, SystemClock, VERSION};
use acb_ledger::FileJournal;
use acb_protocol::LedgerService;
use acb_server::{router, AppState, ServerConfig, ServerMetrics};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = ServerConfig::load()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let service = match &config.journal_path {
        Some(path) => {
            let journal = FileJournal::open(path)
                .await
                .with_context(|| format!("opening journal {}", path.display()))?;
            LedgerService::open(config.protocol.clone(), clock, Arc::new(journal))
                .await
                .context("replaying ledger journal")?
        }
        None => {
            warn!("ACB_JOURNAL_PATH not set, ledger state will not survive a restart");
            LedgerService::in_memory(config.protocol.clone(), clock)
        }
    };

    let metrics = ServerMetrics::new().context("registering metrics")?;
    let state = AppState {
        service: Arc::new(service),
        metrics: Arc::new(metrics),
    };
    metrics_snapshot(&state);

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(version = VERSION, "ACB ledger server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ACB ledger server stopped");
    Ok(())
}

/// Prime the gauges so the first scrape reflects replayed state
fn metrics_snapshot(state: &AppState) {
    state.metrics.refresh(&state.service);
    let pool = state.service.ledger().pool();
    info!(
        liquidity = %pool.total_liquidity,
        borrowed = %pool.total_borrowed,
        reserve = %pool.risk_reserve,
        "Pool loaded"
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
