use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::Result;
use crate::provider::InsightProvider;
use crate::types::{InsightKey, InsightPlayer, InsightTeam};

/// A record type served by one of the per-(category, sport) insight feeds.
#[async_trait]
pub trait InsightFeed: Sized + Send + Sync + 'static {
    const LABEL: &'static str;

    async fn fetch(provider: &dyn InsightProvider, key: InsightKey) -> Result<Vec<Self>>;
}

#[async_trait]
impl InsightFeed for InsightPlayer {
    const LABEL: &'static str = "player insight";

    async fn fetch(provider: &dyn InsightProvider, key: InsightKey) -> Result<Vec<Self>> {
        provider.fetch_player_insight(key).await
    }
}

#[async_trait]
impl InsightFeed for InsightTeam {
    const LABEL: &'static str = "team insight";

    async fn fetch(provider: &dyn InsightProvider, key: InsightKey) -> Result<Vec<Self>> {
        provider.fetch_team_insight(key).await
    }
}

pub type PlayerInsightCache = InsightCache<InsightPlayer>;
pub type TeamInsightCache = InsightCache<InsightTeam>;

type Cell<T> = Arc<Mutex<Option<Arc<Vec<T>>>>>;

/// Most recent raw feed per (category, sport), plus last/next update times.
///
/// Each cell has its own async lock held across the upstream fetch, so a
/// reader waits on an in-flight fetch for its own key only.
pub struct InsightCache<T: InsightFeed> {
    provider: Arc<dyn InsightProvider>,
    cells: DashMap<InsightKey, Cell<T>>,
    last_update: DashMap<InsightKey, DateTime<Utc>>,
    next_update: DashMap<InsightKey, DateTime<Utc>>,
}

impl<T: InsightFeed> InsightCache<T> {
    pub fn new(provider: Arc<dyn InsightProvider>) -> Self {
        Self {
            provider,
            cells: DashMap::new(),
            last_update: DashMap::new(),
            next_update: DashMap::new(),
        }
    }

    /// Cached feed for `key`, fetched on first access.
    pub async fn get(&self, key: InsightKey) -> Arc<Vec<T>> {
        let cell = self.cell(key);
        let mut slot = cell.lock().await;
        if let Some(feed) = slot.as_ref() {
            return Arc::clone(feed);
        }
        let feed = Arc::new(self.download(key).await);
        *slot = Some(Arc::clone(&feed));
        feed
    }

    /// Drop the cell for `key` and fetch it again.
    pub async fn refresh(&self, key: InsightKey) -> Arc<Vec<T>> {
        let cell = self.cell(key);
        let mut slot = cell.lock().await;
        *slot = None;
        let feed = Arc::new(self.download(key).await);
        *slot = Some(Arc::clone(&feed));
        feed
    }

    pub fn clear_all(&self) {
        self.cells.clear();
    }

    pub fn last_update(&self, key: InsightKey) -> Option<DateTime<Utc>> {
        self.last_update.get(&key).map(|t| *t)
    }

    pub fn next_update(&self, key: InsightKey) -> Option<DateTime<Utc>> {
        self.next_update.get(&key).map(|t| *t)
    }

    /// Written by the scheduler whenever it arms this key's timer.
    pub fn set_next_update(&self, key: InsightKey, at: DateTime<Utc>) {
        self.next_update.insert(key, at);
    }

    fn cell(&self, key: InsightKey) -> Cell<T> {
        Arc::clone(self.cells.entry(key).or_default().value())
    }

    /// Stamps the fetch start as the cell's last update, then fetches. Any
    /// upstream failure degrades to an empty feed.
    async fn download(&self, key: InsightKey) -> Vec<T> {
        let started = Utc::now();
        self.last_update
            .entry(key)
            .and_modify(|t| *t = (*t).max(started))
            .or_insert(started);

        info!(category = %key.category, sport = %key.sport, "Start retrieving {} for {key}", T::LABEL);
        match T::fetch(self.provider.as_ref(), key).await {
            Ok(feed) => {
                info!(
                    category = %key.category,
                    sport = %key.sport,
                    records = feed.len(),
                    "Finished retrieving {} for {key}",
                    T::LABEL,
                );
                feed
            }
            Err(e) => {
                error!(category = %key.category, sport = %key.sport, "Could not retrieve {} for {key}: {e}", T::LABEL);
                Vec::new()
            }
        }
    }
}
