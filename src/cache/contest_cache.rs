use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::provider::InsightProvider;
use crate::types::Contest;

/// Single-slot cache of the current contest list.
pub struct ContestCache {
    provider: Arc<dyn InsightProvider>,
    contests: Mutex<Option<Arc<Vec<Contest>>>>,
    last_update: StdMutex<Option<DateTime<Utc>>>,
    next_update: StdMutex<Option<DateTime<Utc>>>,
}

impl ContestCache {
    pub fn new(provider: Arc<dyn InsightProvider>) -> Self {
        Self {
            provider,
            contests: Mutex::new(None),
            last_update: StdMutex::new(None),
            next_update: StdMutex::new(None),
        }
    }

    /// Cached contest list, fetched on first access.
    pub async fn get_contests(&self) -> Arc<Vec<Contest>> {
        let mut slot = self.contests.lock().await;
        if let Some(contests) = slot.as_ref() {
            return Arc::clone(contests);
        }
        let contests = Arc::new(self.download().await);
        *slot = Some(Arc::clone(&contests));
        contests
    }

    /// Unconditionally drop and re-fetch the contest list.
    pub async fn refresh_contests(&self) -> Arc<Vec<Contest>> {
        let mut slot = self.contests.lock().await;
        *slot = None;
        let contests = Arc::new(self.download().await);
        *slot = Some(Arc::clone(&contests));
        contests
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.lock().ok().and_then(|t| *t)
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update.lock().ok().and_then(|t| *t)
    }

    pub fn set_next_update(&self, at: DateTime<Utc>) {
        if let Ok(mut next) = self.next_update.lock() {
            *next = Some(at);
        }
    }

    async fn download(&self) -> Vec<Contest> {
        let started = Utc::now();
        if let Ok(mut last) = self.last_update.lock() {
            let stamped = last.map_or(started, |t| t.max(started));
            *last = Some(stamped);
        }

        info!("Start retrieving contest list");
        match self.provider.fetch_contest_list().await {
            Ok(contests) => {
                info!(contests = contests.len(), "Finished retrieving contest list");
                contests
            }
            Err(e) => {
                error!("Could not retrieve contest list: {e}");
                Vec::new()
            }
        }
    }
}
