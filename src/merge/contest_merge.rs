use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::analytics::apply_player_analytics;
use super::player_index::{merge_insight, player_mut, PlayerIndex};
use super::team_defense::{apply_opposition_percentiles, team_percentiles};
use crate::config::points_per_dollar_multiplier;
use crate::names::NameResolver;
use crate::types::{Contest, EnrichedContest, InsightPlayer, InsightTeam};

/// Upstream player record that matched no roster player of its own team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPlayer {
    pub name: String,
    pub team: String,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub view: EnrichedContest,
    /// Records reported to the resolver as missing names during this pass.
    pub missing: Vec<MissingPlayer>,
}

/// Build a fresh enriched view of `contest` from the current insight feeds of
/// its (category, sport). The contest itself is never mutated; every pass
/// starts from a clean copy so repeated passes over unchanged inputs produce
/// identical views.
pub fn merge_contest(
    contest: &Contest,
    player_feed: &[InsightPlayer],
    team_feed: &[InsightTeam],
    resolver: &dyn NameResolver,
    last_update: Option<DateTime<Utc>>,
    next_update: Option<DateTime<Utc>>,
) -> MergeOutcome {
    let mut view = EnrichedContest::from_contest(contest);
    let index = PlayerIndex::build(&mut view);

    // --- Player insight ---
    let mut unmerged: Vec<&InsightPlayer> = Vec::new();
    for record in player_feed {
        let (Some(name), Some(team)) = (record.name.as_deref(), record.team.as_deref()) else {
            unmerged.push(record);
            continue;
        };
        match index.find(team, name, resolver) {
            Some(slot) => merge_insight(player_mut(&mut view, slot), record),
            None => unmerged.push(record),
        }
    }

    let missing = report_missing(contest, &index, &unmerged, resolver);

    // --- Team insight ---
    let percentiles = team_percentiles(team_feed, index.teams());
    apply_opposition_percentiles(&mut view, &percentiles);

    // --- Derived analytics ---
    apply_player_analytics(&mut view, points_per_dollar_multiplier(contest.category));

    view.player_data_last_update_time = last_update;
    view.player_data_next_update_time = next_update;

    debug!(
        contest = %contest.id,
        players = view.players().count(),
        missing = missing.len(),
        "Merged contest",
    );
    MergeOutcome { view, missing }
}

fn report_missing(
    contest: &Contest,
    index: &PlayerIndex,
    unmerged: &[&InsightPlayer],
    resolver: &dyn NameResolver,
) -> Vec<MissingPlayer> {
    let mut reported = Vec::new();
    for record in unmerged {
        match (record.name.as_deref(), record.team.as_deref()) {
            (Some(name), Some(team)) if !name.is_empty() && index.has_team(team) => {
                resolver.add_missing_name(contest.category, contest.sport, name, team);
                reported.push(MissingPlayer {
                    name: name.to_string(),
                    team: team.to_string(),
                });
            }
            (Some(name), Some(team)) if !name.is_empty() && !team.is_empty() => {
                error!(
                    contest = %contest.id,
                    "Missing player {name} plays for {team}, which is not in this contest",
                );
            }
            (name, team) => {
                error!(
                    contest = %contest.id,
                    "Missing player record lacks a name or team: name={name:?} team={team:?}",
                );
            }
        }
    }
    reported
}
