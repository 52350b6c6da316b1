use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::types::InsightKey;

/// Work item for the scheduler loop. Sent by fired timers and by the
/// `/refresh` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCommand {
    /// Cancel every timer, clear both insight caches, refresh the contest list.
    RefreshAll,
    ContestList,
    PlayerInsight(InsightKey),
    TeamInsight(InsightKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    ContestList,
    PlayerInsight(InsightKey),
    TeamInsight(InsightKey),
}

impl TimerKey {
    pub fn command(self) -> RefreshCommand {
        match self {
            TimerKey::ContestList => RefreshCommand::ContestList,
            TimerKey::PlayerInsight(key) => RefreshCommand::PlayerInsight(key),
            TimerKey::TeamInsight(key) => RefreshCommand::TeamInsight(key),
        }
    }
}

/// Absent from the table = idle.
#[derive(Debug)]
enum TimerState {
    Armed {
        fire_at: DateTime<Utc>,
        handle: AbortHandle,
        id: u64,
    },
    /// Timer elapsed and its command is queued; the entry stays until the
    /// scheduler cancels the key while handling that command.
    Firing,
}

type Timers = Arc<Mutex<HashMap<TimerKey, TimerState>>>;

/// At most one timer per key. A timer task only sleeps and enqueues its
/// command; all refresh work happens in the scheduler loop.
pub struct TimerTable {
    timers: Timers,
    commands: mpsc::Sender<RefreshCommand>,
    next_id: AtomicU64,
}

impl TimerTable {
    pub fn new(commands: mpsc::Sender<RefreshCommand>) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            commands,
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm `key` to fire at `fire_at` unless the key already has a timer.
    /// Returns whether a new timer was armed.
    pub fn arm(&self, key: TimerKey, fire_at: DateTime<Utc>) -> bool {
        let Ok(mut timers) = self.timers.lock() else {
            warn!(?key, "Timer table lock poisoned; timer not armed");
            return false;
        };
        if timers.contains_key(&key) {
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();
        let table = Arc::clone(&self.timers);
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !mark_firing(&table, key, id) {
                return;
            }
            debug!(?key, "Timer fired");
            if commands.send(key.command()).await.is_err() {
                warn!(?key, "Scheduler stopped; dropped timer command");
            }
        });

        timers.insert(
            key,
            TimerState::Armed {
                fire_at,
                handle: task.abort_handle(),
                id,
            },
        );
        true
    }

    /// Idle `key`. Safe on an idle key, and on a key whose timer already
    /// fired (its queued command still runs).
    pub fn cancel(&self, key: TimerKey) -> bool {
        let Ok(mut timers) = self.timers.lock() else {
            return false;
        };
        match timers.remove(&key) {
            Some(TimerState::Armed { handle, .. }) => {
                handle.abort();
                true
            }
            Some(TimerState::Firing) | None => false,
        }
    }

    pub fn cancel_all(&self) {
        let Ok(mut timers) = self.timers.lock() else {
            return;
        };
        for (_, state) in timers.drain() {
            if let TimerState::Armed { handle, .. } = state {
                handle.abort();
            }
        }
    }

    /// Fire time of an armed key. None when idle or already fired.
    pub fn fire_at(&self, key: TimerKey) -> Option<DateTime<Utc>> {
        let timers = self.timers.lock().ok()?;
        match timers.get(&key)? {
            TimerState::Armed { fire_at, .. } => Some(*fire_at),
            TimerState::Firing => None,
        }
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.fire_at(key).is_some()
    }

    pub fn armed_count(&self) -> usize {
        self.timers
            .lock()
            .map(|t| t.values().filter(|s| matches!(s, TimerState::Armed { .. })).count())
            .unwrap_or(0)
    }
}

/// Armed → Firing, only if the entry still belongs to timer `id`.
fn mark_firing(timers: &Timers, key: TimerKey, id: u64) -> bool {
    let Ok(mut timers) = timers.lock() else {
        return false;
    };
    let current = matches!(timers.get(&key), Some(TimerState::Armed { id: armed, .. }) if *armed == id);
    if current {
        timers.insert(key, TimerState::Firing);
    }
    current
}
