use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use crate::cache::{ContestCache, PlayerInsightCache, TeamInsightCache};
use crate::merge::merge_contest;
use crate::names::NameResolver;
use crate::provider::InsightProvider;
use crate::state::ContestStore;
use crate::types::{Contest, EnrichedContest, InsightKey, PlayerCard};

/// Read facade over the caches and the published contest views.
///
/// Readers get complete views only; a contest that has never been merged is
/// merged on demand. Every merge, scheduled or on demand, runs inside a name
/// cycle: reload names, merge, save names, all under `name_cycle`.
pub struct LineupAggregator {
    provider: Arc<dyn InsightProvider>,
    resolver: Arc<dyn NameResolver>,
    contests: ContestCache,
    player_insight: PlayerInsightCache,
    team_insight: TeamInsightCache,
    store: Arc<ContestStore>,
    name_cycle: Mutex<()>,
}

type NameCycle<'a> = MutexGuard<'a, ()>;

impl LineupAggregator {
    pub fn new(provider: Arc<dyn InsightProvider>, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            contests: ContestCache::new(Arc::clone(&provider)),
            player_insight: PlayerInsightCache::new(Arc::clone(&provider)),
            team_insight: TeamInsightCache::new(Arc::clone(&provider)),
            store: ContestStore::new(),
            name_cycle: Mutex::new(()),
            provider,
            resolver,
        }
    }

    pub fn contest_cache(&self) -> &ContestCache {
        &self.contests
    }

    pub fn player_insight_cache(&self) -> &PlayerInsightCache {
        &self.player_insight
    }

    pub fn team_insight_cache(&self) -> &TeamInsightCache {
        &self.team_insight
    }

    pub fn store(&self) -> &ContestStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Enriched views of every contest that has not started yet.
    pub async fn get_contests(&self) -> Vec<Arc<EnrichedContest>> {
        let now = Utc::now();
        let contests = self.contests.get_contests().await;
        let upcoming: Vec<&Contest> = contests
            .iter()
            .filter(|c| c.start_time.is_some_and(|t| t > now))
            .collect();
        self.views_for(&upcoming).await
    }

    pub async fn get_contest(&self, contest_id: &str) -> Option<Arc<EnrichedContest>> {
        let contests = self.contests.get_contests().await;
        let contest = contests.iter().find(|c| c.id == contest_id)?;
        self.views_for(&[contest]).await.pop()
    }

    /// None when the contest is unknown. A failed upstream fetch yields an
    /// empty card.
    pub async fn get_player_card(&self, contest_id: &str, player_id: &str) -> Option<PlayerCard> {
        let contests = self.contests.get_contests().await;
        let contest = contests.iter().find(|c| c.id == contest_id)?;

        info!(contest = %contest_id, player = %player_id, "Start retrieving player card");
        match self
            .provider
            .fetch_player_card(contest.category, &contest.id, player_id)
            .await
        {
            Ok(card) => {
                info!(contest = %contest_id, player = %player_id, "Finished retrieving player card");
                Some(card)
            }
            Err(e) => {
                error!(contest = %contest_id, player = %player_id, "Could not retrieve player card: {e}");
                Some(PlayerCard::default())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Merge notifications
    // -----------------------------------------------------------------------

    /// Contest list changed: drop views of delisted contests and re-merge
    /// every listed contest.
    pub async fn cache_updated(&self) {
        let contests = self.contests.get_contests().await;
        let live: HashSet<&str> = contests.iter().map(|c| c.id.as_str()).collect();

        let cycle = self.name_cycle.lock().await;
        let evicted = self.store.retain_contests(&live);
        let missing = self.remerge(&cycle, contests.iter().collect()).await;
        info!(
            contests = contests.len(),
            evicted,
            missing,
            "Rebuilt every contest after contest list refresh",
        );
    }

    /// One insight cell changed: re-merge only the contests it feeds.
    pub async fn cache_updated_for(&self, key: InsightKey) {
        let contests = self.contests.get_contests().await;
        let affected: Vec<&Contest> = contests.iter().filter(|c| c.key() == key).collect();
        let count = affected.len();

        let cycle = self.name_cycle.lock().await;
        let missing = self.remerge(&cycle, affected).await;
        info!(
            category = %key.category,
            sport = %key.sport,
            contests = count,
            missing,
            "Rebuilt contests for {key}",
        );
    }

    /// Returns how many missing names the pass reported.
    async fn remerge(&self, cycle: &NameCycle<'_>, contests: Vec<&Contest>) -> usize {
        self.reload_names().await;
        let mut missing = 0;
        for contest in contests {
            missing += self.merge(cycle, contest).await.1;
        }
        self.save_names().await;
        missing
    }

    /// Published views for `contests`, in order. Contests without a view are
    /// merged together in a single name cycle.
    async fn views_for(&self, contests: &[&Contest]) -> Vec<Arc<EnrichedContest>> {
        let published: Vec<_> = contests.iter().map(|c| self.store.get(&c.id)).collect();
        if published.iter().all(Option::is_some) {
            return published.into_iter().flatten().collect();
        }

        let cycle = self.name_cycle.lock().await;
        let mut reloaded = false;
        let mut views = Vec::with_capacity(contests.len());
        for contest in contests {
            if let Some(view) = self.store.get(&contest.id) {
                views.push(view);
                continue;
            }
            if !reloaded {
                self.reload_names().await;
                reloaded = true;
            }
            views.push(self.merge(&cycle, contest).await.0);
        }
        if reloaded {
            self.save_names().await;
        }
        views
    }

    async fn merge(&self, _cycle: &NameCycle<'_>, contest: &Contest) -> (Arc<EnrichedContest>, usize) {
        let key = contest.key();
        let players = self.player_insight.get(key).await;
        let teams = self.team_insight.get(key).await;
        let outcome = merge_contest(
            contest,
            &players,
            &teams,
            self.resolver.as_ref(),
            self.player_insight.last_update(key),
            self.player_insight.next_update(key),
        );

        let missing = outcome.missing.len();
        if missing > 0 {
            let names: Vec<String> = outcome
                .missing
                .iter()
                .map(|m| format!("{} ({})", m.name, m.team))
                .collect();
            info!(contest = %contest.id, missing, "Unmatched player names: {}", names.join(", "));
        }
        (self.store.publish(outcome.view), missing)
    }

    async fn reload_names(&self) {
        if self.resolver.is_valid() {
            self.resolver.reload().await;
        } else {
            info!("Name resolver unavailable; skipped reloading alternate names");
        }
    }

    async fn save_names(&self) {
        if self.resolver.is_valid() {
            self.resolver.save_updates().await;
        } else {
            info!("Name resolver unavailable; skipped saving missing names");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, Utc};

    use crate::types::{Contest, ContestCategory, Game, InsightKey, InsightPlayer, Player, Sport, StatEntry, Team};

    pub fn nba_key() -> InsightKey {
        InsightKey::new(ContestCategory::FanDuel, Sport::Nba)
    }

    pub fn roster_player(team: &str, name: &str) -> Player {
        Player {
            id: format!("{team}-{name}"),
            name: name.to_string(),
            team: team.to_string(),
            position: "PG".to_string(),
            salary: Some(8_000.0),
            is_starter: false,
            stats: Vec::new(),
            mlb_specific: None,
        }
    }

    pub fn contest_at(id: &str, key: InsightKey, start_time: Option<DateTime<Utc>>) -> Contest {
        Contest {
            id: id.to_string(),
            category: key.category,
            sport: key.sport,
            label: format!("Contest {id}"),
            start_time,
            games: vec![Game {
                away_team: Team { code: "LAL".to_string(), players: vec![roster_player("LAL", "lebron james")] },
                home_team: Team { code: "BOS".to_string(), players: vec![roster_player("BOS", "jayson tatum")] },
                start_time,
            }],
            positions: Vec::new(),
        }
    }

    pub fn upcoming(id: &str, key: InsightKey, hours: i64) -> Contest {
        contest_at(id, key, Some(Utc::now() + Duration::hours(hours)))
    }

    pub fn projection(team: &str, name: &str, points: f64) -> InsightPlayer {
        InsightPlayer {
            name: Some(name.to_string()),
            team: Some(team.to_string()),
            stats: vec![StatEntry {
                source: "numberfire".to_string(),
                projected_points: Some(points),
                ..Default::default()
            }],
            is_starter: false,
            mlb_specific: None,
        }
    }
}
