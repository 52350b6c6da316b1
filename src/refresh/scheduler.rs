use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::schedule::{next_contest_update, next_player_insight_update, next_team_insight_update};
use super::timers::{RefreshCommand, TimerKey, TimerTable};
use crate::aggregator::LineupAggregator;
use crate::api::health::HealthState;
use crate::types::{Contest, InsightKey};

/// Single writer for every cache refresh. Timers and the HTTP trigger only
/// enqueue commands; this loop runs them one at a time, so a cell refresh and
/// the merges it triggers never interleave with another refresh.
pub struct RefreshScheduler {
    aggregator: Arc<LineupAggregator>,
    timers: TimerTable,
    health: Arc<HealthState>,
}

impl RefreshScheduler {
    /// Timers enqueue through `commands_tx`; pass its receiver to [`run`](Self::run).
    pub fn new(
        aggregator: Arc<LineupAggregator>,
        commands_tx: mpsc::Sender<RefreshCommand>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            aggregator,
            timers: TimerTable::new(commands_tx),
            health,
        }
    }

    pub async fn run(self, mut commands: mpsc::Receiver<RefreshCommand>) {
        info!("Refresh scheduler started");
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        self.timers.cancel_all();
        warn!("Refresh command channel closed; scheduler stopped");
    }

    pub async fn handle(&self, command: RefreshCommand) {
        self.health.set_refreshing(true);
        match command {
            RefreshCommand::RefreshAll => self.refresh_all_data().await,
            RefreshCommand::ContestList => self.refresh_contest_cache().await,
            RefreshCommand::PlayerInsight(key) => self.refresh_player_insight_cache(key).await,
            RefreshCommand::TeamInsight(key) => self.refresh_team_insight_cache(key).await,
        }
        self.health.set_refreshing(false);
        self.health.record_refresh(now_ms());
    }

    // -----------------------------------------------------------------------
    // Refresh operations
    // -----------------------------------------------------------------------

    /// Hard reset: idle every timer, drop every insight cell, then run a
    /// normal contest-list cycle.
    pub async fn refresh_all_data(&self) {
        info!("Refreshing all data");
        self.timers.cancel_all();
        self.aggregator.player_insight_cache().clear_all();
        self.aggregator.team_insight_cache().clear_all();
        self.refresh_contest_cache().await;
    }

    pub async fn refresh_contest_cache(&self) {
        self.timers.cancel(TimerKey::ContestList);
        self.setup_contest_timer(Utc::now());

        let contests = self.aggregator.contest_cache().refresh_contests().await;
        let now = Utc::now();
        self.setup_player_insight_timers(&contests, now);
        self.setup_team_insight_timers(&contests, now);
        info!(
            contests = contests.len(),
            armed_timers = self.timers.armed_count(),
            "Contest list cycle scheduled",
        );
        self.aggregator.cache_updated().await;
    }

    pub async fn refresh_player_insight_cache(&self, key: InsightKey) {
        self.timers.cancel(TimerKey::PlayerInsight(key));
        self.aggregator.player_insight_cache().refresh(key).await;

        let contests = self.aggregator.contest_cache().get_contests().await;
        self.setup_player_insight_timers(&contests, Utc::now());
        self.aggregator.cache_updated_for(key).await;
    }

    pub async fn refresh_team_insight_cache(&self, key: InsightKey) {
        self.timers.cancel(TimerKey::TeamInsight(key));
        self.aggregator.team_insight_cache().refresh(key).await;

        let contests = self.aggregator.contest_cache().get_contests().await;
        self.setup_team_insight_timers(&contests, Utc::now());
        self.aggregator.cache_updated_for(key).await;
    }

    // -----------------------------------------------------------------------
    // Timer setup
    // -----------------------------------------------------------------------

    fn setup_contest_timer(&self, now: DateTime<Utc>) {
        let at = next_contest_update(now);
        if self.timers.arm(TimerKey::ContestList, at) {
            info!("Contest list will refresh at {}", at.format("%m/%d/%Y %H:%M:%S%.3f"));
            self.aggregator.contest_cache().set_next_update(at);
        }
    }

    /// Earliest-starting contests first, so each key settles on the time
    /// computed for its soonest contest that still wants a refresh.
    fn setup_player_insight_timers(&self, contests: &[Contest], now: DateTime<Utc>) {
        for contest in by_start_time(contests) {
            let Some(start) = contest.start_time else {
                continue;
            };
            let key = contest.key();
            let timer = TimerKey::PlayerInsight(key);
            if self.timers.is_armed(timer) {
                continue;
            }
            let Some(at) = next_player_insight_update(now, start) else {
                continue;
            };
            if self.timers.arm(timer, at) {
                info!(
                    category = %key.category,
                    sport = %key.sport,
                    "Player insight for {key} will refresh at {}",
                    at.format("%m/%d/%Y %H:%M:%S%.3f"),
                );
                self.aggregator.player_insight_cache().set_next_update(key, at);
            }
        }
    }

    fn setup_team_insight_timers(&self, contests: &[Contest], now: DateTime<Utc>) {
        for contest in by_start_time(contests) {
            if contest.start_time.is_none() {
                continue;
            }
            let key = contest.key();
            let at = next_team_insight_update(now);
            if self.timers.arm(TimerKey::TeamInsight(key), at) {
                info!(
                    category = %key.category,
                    sport = %key.sport,
                    "Team insight for {key} will refresh at {}",
                    at.format("%m/%d/%Y %H:%M:%S%.3f"),
                );
                self.aggregator.team_insight_cache().set_next_update(key, at);
            }
        }
    }
}

/// Contests without a start time sort first.
fn by_start_time(contests: &[Contest]) -> Vec<&Contest> {
    let mut sorted: Vec<&Contest> = contests.iter().collect();
    sorted.sort_by_key(|c| c.start_time);
    sorted
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration;

    use super::*;
    use crate::aggregator::test_support::*;
    use crate::names::NoopNameResolver;
    use crate::provider::fake::FakeProvider;
    use crate::types::{ContestCategory, InsightTeam, PositionPoints, Sport};

    fn scheduler(fake: Arc<FakeProvider>) -> RefreshScheduler {
        let aggregator = Arc::new(LineupAggregator::new(fake, Arc::new(NoopNameResolver)));
        let (tx, _rx) = mpsc::channel(16);
        RefreshScheduler::new(aggregator, tx, Arc::new(HealthState::new()))
    }

    #[test]
    fn contests_sort_by_start_time() {
        let key = nba_key();
        let contests = vec![upcoming("late", key, 10), contest_at("undated", key, None), upcoming("soon", key, 2)];
        let ids: Vec<&str> = by_start_time(&contests).into_iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["undated", "soon", "late"]);
    }

    #[tokio::test]
    async fn contest_cycle_arms_timers_and_merges() {
        let key = nba_key();
        let fake = Arc::new(FakeProvider::with_contests(vec![upcoming("c1", key, 3)]));
        fake.set_players(key, vec![projection("LAL", "lebron james", 44.0)]);
        let sched = scheduler(fake.clone());

        sched.refresh_contest_cache().await;

        assert!(sched.timers.is_armed(TimerKey::ContestList));
        assert!(sched.timers.is_armed(TimerKey::PlayerInsight(key)));
        assert!(sched.timers.is_armed(TimerKey::TeamInsight(key)));
        let agg = &sched.aggregator;
        assert_eq!(agg.contest_cache().next_update(), sched.timers.fire_at(TimerKey::ContestList));
        assert_eq!(
            agg.player_insight_cache().next_update(key),
            sched.timers.fire_at(TimerKey::PlayerInsight(key))
        );

        let view = agg.store().get("c1").unwrap();
        assert_eq!(view.players().find(|p| p.player.team == "LAL").unwrap().projected_points, Some(44.0));
        assert_eq!(view.player_data_next_update_time, agg.player_insight_cache().next_update(key));
    }

    #[tokio::test]
    async fn contest_near_lock_leaves_player_timer_idle() {
        let key = nba_key();
        let soon = contest_at("c1", key, Some(Utc::now() + Duration::minutes(3)));
        let fake = Arc::new(FakeProvider::with_contests(vec![soon]));
        let sched = scheduler(fake);

        sched.refresh_contest_cache().await;
        assert!(!sched.timers.is_armed(TimerKey::PlayerInsight(key)));
        assert!(sched.timers.is_armed(TimerKey::TeamInsight(key)));
    }

    #[tokio::test]
    async fn player_timer_falls_through_to_next_relevant_contest() {
        let key = nba_key();
        let fake = Arc::new(FakeProvider::with_contests(vec![
            contest_at("locked", key, Some(Utc::now() + Duration::minutes(2))),
            upcoming("later", key, 3),
        ]));
        let sched = scheduler(fake);

        sched.refresh_contest_cache().await;
        let at = sched.timers.fire_at(TimerKey::PlayerInsight(key)).unwrap();
        assert!(at > Utc::now());
    }

    #[tokio::test]
    async fn player_refresh_rearms_and_remerges_its_key_only() {
        let nba = nba_key();
        let nfl = InsightKey::new(ContestCategory::FanDuel, Sport::Nfl);
        let fake = Arc::new(FakeProvider::with_contests(vec![upcoming("nba", nba, 3), upcoming("nfl", nfl, 3)]));
        fake.set_players(nba, vec![projection("LAL", "lebron james", 30.0)]);
        let sched = scheduler(fake.clone());
        sched.refresh_contest_cache().await;
        let calls = fake.player_calls.load(Ordering::SeqCst);

        fake.set_players(nba, vec![projection("LAL", "lebron james", 35.0)]);
        sched.refresh_player_insight_cache(nba).await;

        assert_eq!(fake.player_calls.load(Ordering::SeqCst), calls + 1);
        assert!(sched.timers.is_armed(TimerKey::PlayerInsight(nba)));
        let view = sched.aggregator.store().get("nba").unwrap();
        assert_eq!(view.players().find(|p| p.player.team == "LAL").unwrap().projected_points, Some(35.0));
    }

    #[tokio::test]
    async fn team_refresh_updates_opposition_percentiles() {
        let key = nba_key();
        let fake = Arc::new(FakeProvider::with_contests(vec![upcoming("c1", key, 3)]));
        let sched = scheduler(fake.clone());
        sched.refresh_contest_cache().await;

        fake.set_teams(
            key,
            vec![
                InsightTeam {
                    code: "LAL".to_string(),
                    points_allowed_per_position: vec![PositionPoints { position: Some("PG".to_string()), points: Some(10.0) }],
                },
                InsightTeam {
                    code: "BOS".to_string(),
                    points_allowed_per_position: vec![PositionPoints { position: Some("PG".to_string()), points: Some(20.0) }],
                },
            ],
        );
        sched.refresh_team_insight_cache(key).await;

        let view = sched.aggregator.store().get("c1").unwrap();
        let lal = view.players().find(|p| p.player.team == "LAL").unwrap();
        assert_eq!(lal.opposition_percentile, Some(100.0));
        assert!(sched.timers.is_armed(TimerKey::TeamInsight(key)));
    }

    #[tokio::test]
    async fn refresh_all_refetches_every_cell() {
        let key = nba_key();
        let fake = Arc::new(FakeProvider::with_contests(vec![upcoming("c1", key, 3)]));
        let sched = scheduler(fake.clone());
        sched.refresh_contest_cache().await;
        let player_calls = fake.player_calls.load(Ordering::SeqCst);
        let team_calls = fake.team_calls.load(Ordering::SeqCst);

        sched.handle(RefreshCommand::RefreshAll).await;

        assert_eq!(fake.player_calls.load(Ordering::SeqCst), player_calls + 1);
        assert_eq!(fake.team_calls.load(Ordering::SeqCst), team_calls + 1);
        assert_eq!(fake.contest_calls.load(Ordering::SeqCst), 2);
        assert!(sched.timers.is_armed(TimerKey::ContestList));
        assert_eq!(sched.health.refreshes_completed(), 1);
        assert!(!sched.health.refreshing());
    }
}
