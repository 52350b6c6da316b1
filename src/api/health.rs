//! Shared health state for the /health endpoint.
//! Updated by the refresh scheduler, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared refresh metrics.
#[derive(Default)]
pub struct HealthState {
    /// True while the scheduler is running a refresh command.
    pub refreshing: AtomicBool,
    /// Millisecond timestamp of the last finished refresh (0 = none).
    pub last_refresh_at_ms: AtomicU64,
    /// Refresh commands handled since startup.
    pub refreshes_completed: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refreshing(&self, v: bool) {
        self.refreshing.store(v, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, at_ms: u64) {
        self.last_refresh_at_ms.store(at_ms, Ordering::Relaxed);
        self.refreshes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Relaxed)
    }

    pub fn last_refresh_at_ms(&self) -> u64 {
        self.last_refresh_at_ms.load(Ordering::Relaxed)
    }

    pub fn refreshes_completed(&self) -> u64 {
        self.refreshes_completed.load(Ordering::Relaxed)
    }
}
