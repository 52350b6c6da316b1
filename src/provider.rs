use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{Contest, ContestCategory, InsightKey, InsightPlayer, InsightTeam, PlayerCard};

/// Upstream data provider. Every call may fail; callers decide how to degrade.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn fetch_contest_list(&self) -> Result<Vec<Contest>>;

    async fn fetch_player_insight(&self, key: InsightKey) -> Result<Vec<InsightPlayer>>;

    async fn fetch_team_insight(&self, key: InsightKey) -> Result<Vec<InsightTeam>>;

    async fn fetch_player_card(
        &self,
        category: ContestCategory,
        contest_id: &str,
        player_id: &str,
    ) -> Result<PlayerCard>;
}

/// JSON-over-HTTP provider client.
pub struct HttpInsightProvider {
    client: reqwest::Client,
    base_url: String,
    latency: Arc<LatencyStats>,
}

impl HttpInsightProvider {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.provider_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.provider_url.trim_end_matches('/').to_string(),
            latency,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("GET {url} returned {status}")));
        }
        let body = resp.bytes().await?;
        self.latency.record(started.elapsed());
        debug!(url = %url, bytes = body.len(), "upstream response received");
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl InsightProvider for HttpInsightProvider {
    async fn fetch_contest_list(&self) -> Result<Vec<Contest>> {
        self.get_json("/contests").await
    }

    async fn fetch_player_insight(&self, key: InsightKey) -> Result<Vec<InsightPlayer>> {
        self.get_json(&format!("/insight/players/{}/{}", key.category, key.sport))
            .await
    }

    async fn fetch_team_insight(&self, key: InsightKey) -> Result<Vec<InsightTeam>> {
        self.get_json(&format!("/insight/teams/{}/{}", key.category, key.sport))
            .await
    }

    async fn fetch_player_card(
        &self,
        category: ContestCategory,
        contest_id: &str,
        player_id: &str,
    ) -> Result<PlayerCard> {
        self.get_json(&format!("/cards/{category}/{contest_id}/{player_id}"))
            .await
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
