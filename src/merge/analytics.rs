use std::collections::HashMap;

use crate::config::{likeability_scales, POSITION_PERCENTILE_SCALE};
use crate::scorer::PercentileScorer;
use crate::types::{EnrichedContest, EnrichedPlayer, PositionPercentile, PositionSlot, StatEntry};

type PlayerScorer = PercentileScorer<EnrichedPlayer>;

struct PositionScorers {
    projected_points: PlayerScorer,
    points_per_dollar: PlayerScorer,
}

impl PositionScorers {
    fn new() -> Self {
        Self {
            projected_points: PercentileScorer::new(|p: &EnrichedPlayer| p.projected_points, POSITION_PERCENTILE_SCALE),
            points_per_dollar: PercentileScorer::new(
                |p: &EnrichedPlayer| p.projected_points_per_dollar,
                POSITION_PERCENTILE_SCALE,
            ),
        }
    }
}

fn likeability_scorers() -> [PlayerScorer; 4] {
    [
        PercentileScorer::new(|p: &EnrichedPlayer| p.projected_points, likeability_scales::PROJECTED_POINTS),
        PercentileScorer::new(|p: &EnrichedPlayer| p.projected_points_per_dollar, likeability_scales::POINTS_PER_DOLLAR),
        PercentileScorer::new(|p: &EnrichedPlayer| p.recent_average_points, likeability_scales::RECENT_AVERAGE),
        PercentileScorer::new(|p: &EnrichedPlayer| p.season_average_points, likeability_scales::SEASON_AVERAGE),
    ]
}

/// Aggregate merged stats onto each player, then rank every player of the
/// contest: likeability across the whole contest and per-label percentiles
/// within each lineup slot the player is eligible for.
pub fn apply_player_analytics(view: &mut EnrichedContest, points_per_dollar_multiplier: f64) {
    let slots = view.positions.clone();
    let mut likeability = likeability_scorers();
    let mut by_label: HashMap<&str, PositionScorers> = HashMap::new();

    for player in view.players_mut() {
        aggregate_player(player, points_per_dollar_multiplier);
        for scorer in likeability.iter_mut() {
            scorer.add_possible_value(player);
        }
        for label in eligible_labels(&slots, &player.player.position) {
            let scorers = by_label.entry(label).or_insert_with(PositionScorers::new);
            scorers.projected_points.add_possible_value(player);
            scorers.points_per_dollar.add_possible_value(player);
        }
    }

    for player in view.players_mut() {
        player.likeability = likeability
            .iter()
            .map(|s| s.scaled_percentile(player).unwrap_or(0.0))
            .sum();

        let mut projected = Vec::new();
        let mut per_dollar = Vec::new();
        for label in eligible_labels(&slots, &player.player.position) {
            let Some(scorers) = by_label.get(label) else {
                continue;
            };
            if let Some(percentile) = scorers.projected_points.scaled_percentile(player) {
                projected.push(PositionPercentile { position: label.to_string(), percentile });
            }
            if let Some(percentile) = scorers.points_per_dollar.scaled_percentile(player) {
                per_dollar.push(PositionPercentile { position: label.to_string(), percentile });
            }
        }
        player.projected_points_percentiles = projected;
        player.projected_points_per_dollar_percentiles = per_dollar;
    }
}

fn aggregate_player(player: &mut EnrichedPlayer, points_per_dollar_multiplier: f64) {
    let stats = &player.player.stats;
    player.is_playing = player.player.is_starter
        || player
            .player
            .mlb_specific
            .as_ref()
            .is_some_and(|m| m.is_probable_pitcher);
    player.projected_ceiling = average(stats, |s| s.projected_ceiling);
    player.projected_floor = average(stats, |s| s.projected_floor);
    player.projected_points = average(stats, |s| s.projected_points);
    player.recent_average_points = average(stats, |s| s.recent_average_points);
    player.season_average_points = average(stats, |s| s.season_average_points);
    player.projected_points_per_dollar =
        points_per_dollar(player.projected_points, player.player.salary, points_per_dollar_multiplier);
}

/// Mean of one stat across sources. Zero counts as a value; None when no
/// source reported the stat at all.
pub fn average(stats: &[StatEntry], value: fn(&StatEntry) -> Option<f64>) -> Option<f64> {
    let (total, count) = stats
        .iter()
        .filter_map(value)
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    (count > 0).then(|| total / count as f64)
}

pub fn points_per_dollar(projected: Option<f64>, salary: Option<f64>, multiplier: f64) -> Option<f64> {
    let (projected, salary) = (projected?, salary?);
    if salary == 0.0 {
        return Some(0.0);
    }
    Some(projected / salary * multiplier)
}

/// Labels of the contest's lineup slots that accept `position`, in slot order.
fn eligible_labels<'a>(slots: &'a [PositionSlot], position: &str) -> Vec<&'a str> {
    slots
        .iter()
        .filter(|s| s.eligible_player_positions.iter().any(|p| p == position))
        .map(|s| s.label.as_str())
        .collect()
}
