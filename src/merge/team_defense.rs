use std::collections::{HashMap, HashSet};

use crate::config::POSITION_PERCENTILE_SCALE;
use crate::scorer::PercentileScorer;
use crate::types::{EnrichedContest, InsightTeam, PositionPoints};

/// team code → position label → percentile of points allowed
pub type TeamPercentiles = HashMap<String, HashMap<String, f64>>;

/// Rank the defenses of the contest's own teams against each other, per
/// position label. Teams outside `known_teams` are ignored entirely.
pub fn team_percentiles(teams: &[InsightTeam], known_teams: &HashSet<String>) -> TeamPercentiles {
    let relevant = || teams.iter().filter(|t| known_teams.contains(&t.code));

    let mut scorers: HashMap<&str, PercentileScorer<PositionPoints>> = HashMap::new();
    for team in relevant() {
        for allowed in &team.points_allowed_per_position {
            if let Some(position) = position_label(allowed) {
                scorers
                    .entry(position)
                    .or_insert_with(|| PercentileScorer::new(|p: &PositionPoints| p.points, POSITION_PERCENTILE_SCALE))
                    .add_possible_value(allowed);
            }
        }
    }

    let mut percentiles = TeamPercentiles::new();
    for team in relevant() {
        let by_position = percentiles.entry(team.code.clone()).or_default();
        for allowed in &team.points_allowed_per_position {
            let Some(position) = position_label(allowed) else {
                continue;
            };
            let Some(scorer) = scorers.get(position) else {
                continue;
            };
            if let Some(percentile) = scorer.scaled_percentile_or_full(allowed) {
                by_position.insert(position.to_string(), percentile);
            }
        }
    }
    percentiles
}

/// Set each roster player's opposition percentile from their opponent's
/// defensive profile. A handedness split (`PITCH-<throw>` for pitchers,
/// `BAT-<bat>` otherwise) wins over the plain position label.
pub fn apply_opposition_percentiles(view: &mut EnrichedContest, percentiles: &TeamPercentiles) {
    for player in view.players_mut() {
        let Some(by_position) = player.opponent.as_ref().and_then(|o| percentiles.get(o)) else {
            continue;
        };

        if let Some(percentile) = by_position.get(&player.player.position) {
            player.opposition_percentile = Some(*percentile);
        }

        if let Some(mlb) = &player.player.mlb_specific {
            let split = if player.player.position == "P" {
                mlb.handedness_throw.as_ref().map(|h| format!("PITCH-{h}"))
            } else {
                mlb.handedness_bat.as_ref().map(|h| format!("BAT-{h}"))
            };
            if let Some(percentile) = split.and_then(|k| by_position.get(&k)) {
                player.opposition_percentile = Some(*percentile);
            }
        }
    }
}

fn position_label(allowed: &PositionPoints) -> Option<&str> {
    allowed.position.as_deref().filter(|p| !p.is_empty())
}
