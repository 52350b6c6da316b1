use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::EnrichedContest;

// ---------------------------------------------------------------------------
// ContestStore
// ---------------------------------------------------------------------------

/// Published enriched views, one per contest.
///
/// A view is never edited in place: a merge builds a whole new
/// `EnrichedContest` and swaps the `Arc`, so a reader holding a view keeps a
/// complete snapshot even while the next merge of that contest runs.
/// Merges themselves are serialized by the aggregator's name cycle.
pub struct ContestStore {
    /// contest_id → latest complete view
    views: DashMap<String, Arc<EnrichedContest>>,
}

impl ContestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, contest_id: &str) -> Option<Arc<EnrichedContest>> {
        self.views.get(contest_id).map(|v| Arc::clone(v.value()))
    }

    pub fn publish(&self, view: EnrichedContest) -> Arc<EnrichedContest> {
        let view = Arc::new(view);
        self.views.insert(view.id.clone(), Arc::clone(&view));
        view
    }

    /// Drop views of contests no longer listed upstream. Returns how many
    /// views were evicted.
    pub fn retain_contests(&self, live_ids: &HashSet<&str>) -> usize {
        let before = self.views.len();
        self.views.retain(|id, _| live_ids.contains(id.as_str()));
        before - self.views.len()
    }

    pub fn contest_count(&self) -> usize {
        self.views.len()
    }
}

impl Default for ContestStore {
    fn default() -> Self {
        Self {
            views: DashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
