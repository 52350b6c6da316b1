use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::aggregator::LineupAggregator;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::refresh::RefreshCommand;
use crate::types::{EnrichedContest, PlayerCard};

#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<LineupAggregator>,
    pub commands: mpsc::Sender<RefreshCommand>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/contests", get(get_contests))
        .route("/contests/:id", get(get_contest))
        .route("/contests/:id/players/:player_id/card", get(get_player_card))
        .route("/refresh", post(post_refresh))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub refreshing: bool,
    pub refreshes_completed: u64,
    pub last_refresh_at_ms: Option<u64>,
    pub contest_list_last_update: Option<DateTime<Utc>>,
    pub contest_list_next_update: Option<DateTime<Utc>>,
    pub cached_contests: usize,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_contests(State(state): State<ApiState>) -> Json<Vec<Arc<EnrichedContest>>> {
    Json(state.aggregator.get_contests().await)
}

async fn get_contest(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Arc<EnrichedContest>>, AppError> {
    state
        .aggregator
        .get_contest(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("contest {id}")))
}

async fn get_player_card(
    State(state): State<ApiState>,
    Path((id, player_id)): Path<(String, String)>,
) -> Result<Json<PlayerCard>, AppError> {
    state
        .aggregator
        .get_player_card(&id, &player_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("contest {id}")))
}

async fn post_refresh(State(state): State<ApiState>) -> Result<StatusCode, AppError> {
    state
        .commands
        .send(RefreshCommand::RefreshAll)
        .await
        .map_err(|_| AppError::SchedulerStopped)?;
    info!("Full refresh requested over HTTP");
    Ok(StatusCode::ACCEPTED)
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let contests = state.aggregator.contest_cache();
    let last_refresh = state.health.last_refresh_at_ms();
    Json(HealthResponse {
        status: "ok",
        refreshing: state.health.refreshing(),
        refreshes_completed: state.health.refreshes_completed(),
        last_refresh_at_ms: (last_refresh > 0).then_some(last_refresh),
        contest_list_last_update: contests.last_update(),
        contest_list_next_update: contests.next_update(),
        cached_contests: state.aggregator.store().contest_count(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_us, p95_us, p99_us) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_us,
        p95_us,
        p99_us,
    })
}
