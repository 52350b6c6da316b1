mod aggregator;
mod api;
mod cache;
mod config;
mod error;
mod merge;
mod names;
mod provider;
mod refresh;
mod scorer;
mod state;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::aggregator::LineupAggregator;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::error::{AppError, Result};
use crate::names::{CachedNameResolver, NameResolver, NoopNameResolver};
use crate::provider::HttpInsightProvider;
use crate::refresh::{RefreshCommand, RefreshScheduler};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Upstream provider ---
    let latency = Arc::new(LatencyStats::new());
    let provider = Arc::new(HttpInsightProvider::new(&cfg, Arc::clone(&latency))?);
    info!("Upstream provider at {}", cfg.provider_url);

    // --- Name resolver ---
    let resolver = name_resolver(&cfg).await;

    // --- Caches + merge engine ---
    let aggregator = Arc::new(LineupAggregator::new(provider, resolver));

    // --- Refresh scheduler ---
    let health = Arc::new(HealthState::new());
    let (command_tx, command_rx) = mpsc::channel::<RefreshCommand>(CHANNEL_CAPACITY);
    let scheduler = RefreshScheduler::new(Arc::clone(&aggregator), command_tx.clone(), Arc::clone(&health));
    tokio::spawn(async move { scheduler.run(command_rx).await });

    // First contest cycle arms every other timer.
    command_tx
        .send(RefreshCommand::ContestList)
        .await
        .map_err(|_| AppError::SchedulerStopped)?;

    // --- HTTP API server ---
    let api_state = ApiState {
        aggregator,
        commands: command_tx,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// No NAMES_DB_PATH → exact-match-only names. A store that cannot be opened
/// still yields a resolver, just one that never reloads or saves.
async fn name_resolver(cfg: &Config) -> Arc<dyn NameResolver> {
    let Some(path) = cfg.names_db_path.as_deref() else {
        info!("NAMES_DB_PATH not set: player names are matched exactly");
        return Arc::new(NoopNameResolver);
    };
    match CachedNameResolver::connect(path).await {
        Ok(resolver) => Arc::new(resolver),
        Err(e) => {
            warn!("Could not open name store at {path}: {e}; alternate names disabled");
            Arc::new(CachedNameResolver::detached())
        }
    }
}
