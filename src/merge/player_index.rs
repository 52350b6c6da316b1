use std::collections::{HashMap, HashSet};

use crate::names::NameResolver;
use crate::types::{EnrichedContest, EnrichedPlayer, InsightPlayer, MlbSpecific, StatEntry};

/// Location of a roster player inside an [`EnrichedContest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSlot {
    game: usize,
    home: bool,
    index: usize,
}

/// Lookup tables for one merge pass over one contest. Built from scratch each
/// pass and dropped with it.
#[derive(Debug, Default)]
pub struct PlayerIndex {
    /// `"<team>-<name>"` lowercased → roster slot
    players: HashMap<String, PlayerSlot>,
    /// team codes playing in the contest
    teams: HashSet<String>,
}

pub fn player_key(team: &str, name: &str) -> String {
    format!("{team}-{name}").to_lowercase()
}

impl PlayerIndex {
    /// Index every roster player and stamp each one's opponent team code.
    pub fn build(view: &mut EnrichedContest) -> Self {
        let mut index = Self::default();
        for (game_idx, game) in view.games.iter_mut().enumerate() {
            let away_code = game.away_team.code.clone();
            let home_code = game.home_team.code.clone();
            for (home, team, opponent) in [
                (false, &mut game.away_team, &home_code),
                (true, &mut game.home_team, &away_code),
            ] {
                index.teams.insert(team.code.clone());
                for (player_idx, player) in team.players.iter_mut().enumerate() {
                    player.opponent = Some(opponent.clone());
                    index.players.insert(
                        player_key(&player.player.team, &player.player.name),
                        PlayerSlot { game: game_idx, home, index: player_idx },
                    );
                }
            }
        }
        index
    }

    pub fn has_team(&self, code: &str) -> bool {
        self.teams.contains(code)
    }

    pub fn teams(&self) -> &HashSet<String> {
        &self.teams
    }

    /// Exact `(team, name)` match first, then the resolver's curated alternate
    /// name for `name`. A hit through the alternate is reported back to the
    /// resolver.
    pub fn find(&self, team: &str, name: &str, resolver: &dyn NameResolver) -> Option<PlayerSlot> {
        if let Some(slot) = self.players.get(&player_key(team, name)) {
            return Some(*slot);
        }
        let alternate = resolver.alternate_name(name)?;
        let slot = *self.players.get(&player_key(team, &alternate))?;
        resolver.alternate_name_used(name);
        Some(slot)
    }
}

pub fn player_mut(view: &mut EnrichedContest, slot: PlayerSlot) -> &mut EnrichedPlayer {
    let game = &mut view.games[slot.game];
    let team = if slot.home { &mut game.home_team } else { &mut game.away_team };
    &mut team.players[slot.index]
}

/// Fold one upstream insight record into a roster player.
pub fn merge_insight(target: &mut EnrichedPlayer, source: &InsightPlayer) {
    merge_stats(&mut target.player.stats, &source.stats);

    if let Some(source_mlb) = &source.mlb_specific {
        let target_mlb = target.player.mlb_specific.get_or_insert_with(MlbSpecific::default);
        if is_batting_order(source_mlb.batting_order.as_deref())
            && !is_batting_order(target_mlb.batting_order.as_deref())
        {
            target_mlb.batting_order = source_mlb.batting_order.clone();
        }
    }

    if source.is_starter {
        target.player.is_starter = true;
    }
}

/// Same-source entries take only the source's non-zero numbers; unseen
/// sources are appended.
pub fn merge_stats(target: &mut Vec<StatEntry>, source: &[StatEntry]) {
    for stat in source {
        match target.iter_mut().find(|t| t.source == stat.source) {
            Some(existing) => {
                overwrite_if_set(&mut existing.projected_points, stat.projected_points);
                overwrite_if_set(&mut existing.projected_ceiling, stat.projected_ceiling);
                overwrite_if_set(&mut existing.projected_floor, stat.projected_floor);
                overwrite_if_set(&mut existing.recent_average_points, stat.recent_average_points);
                overwrite_if_set(&mut existing.season_average_points, stat.season_average_points);
            }
            None => target.push(stat.clone()),
        }
    }
}

fn overwrite_if_set(target: &mut Option<f64>, source: Option<f64>) {
    if let Some(value) = source.filter(|v| *v != 0.0 && !v.is_nan()) {
        *target = Some(value);
    }
}

fn is_batting_order(order: Option<&str>) -> bool {
    match order {
        Some(o) => {
            let o = o.trim();
            !o.is_empty() && !o.eq_ignore_ascii_case("na") && !o.eq_ignore_ascii_case("n/a")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{CachedNameResolver, NoopNameResolver};
    use crate::types::{Contest, ContestCategory, Game, Player, Sport, Team};

    fn player(team: &str, name: &str) -> Player {
        Player {
            id: name.to_string(),
            name: name.to_string(),
            team: team.to_string(),
            position: "SF".to_string(),
            salary: Some(10_000.0),
            is_starter: false,
            stats: Vec::new(),
            mlb_specific: None,
        }
    }

    fn contest() -> Contest {
        Contest {
            id: "c1".to_string(),
            category: ContestCategory::FanDuel,
            sport: Sport::Nba,
            label: "Main".to_string(),
            start_time: None,
            games: vec![Game {
                away_team: Team { code: "LAL".to_string(), players: vec![player("LAL", "LeBron James")] },
                home_team: Team { code: "BOS".to_string(), players: vec![player("BOS", "Jayson Tatum")] },
                start_time: None,
            }],
            positions: Vec::new(),
        }
    }

    fn stat(source: &str, points: Option<f64>) -> StatEntry {
        StatEntry {
            source: source.to_string(),
            projected_points: points,
            ..Default::default()
        }
    }

    #[test]
    fn build_indexes_players_and_sets_opponents() {
        let mut view = EnrichedContest::from_contest(&contest());
        let index = PlayerIndex::build(&mut view);

        assert!(index.has_team("LAL") && index.has_team("BOS"));
        let slot = index.find("lal", "lebron james", &NoopNameResolver).unwrap();
        let lebron = player_mut(&mut view, slot);
        assert_eq!(lebron.player.name, "LeBron James");
        assert_eq!(lebron.opponent.as_deref(), Some("BOS"));

        let slot = index.find("BOS", "Jayson Tatum", &NoopNameResolver).unwrap();
        assert_eq!(player_mut(&mut view, slot).opponent.as_deref(), Some("LAL"));
    }

    #[test]
    fn alternate_name_is_used_only_on_exact_miss() {
        let mut view = EnrichedContest::from_contest(&contest());
        let index = PlayerIndex::build(&mut view);
        let resolver = CachedNameResolver::detached();
        resolver.insert_alternate_name("lebron", "lebron james");

        assert!(index.find("LAL", "lebron", &NoopNameResolver).is_none());
        assert!(index.find("LAL", "lebron", &resolver).is_some());
        assert!(resolver.last_used("lebron").is_some());
        // alternate only applies within the same team
        assert!(index.find("BOS", "lebron", &resolver).is_none());
    }

    #[test]
    fn zero_source_value_never_overwrites() {
        let mut target = vec![stat("numberfire", Some(15.0))];
        merge_stats(&mut target, &[stat("numberfire", Some(0.0))]);
        assert_eq!(target[0].projected_points, Some(15.0));

        merge_stats(&mut target, &[stat("numberfire", None)]);
        assert_eq!(target[0].projected_points, Some(15.0));

        merge_stats(&mut target, &[stat("numberfire", Some(21.5))]);
        assert_eq!(target[0].projected_points, Some(21.5));
    }

    #[test]
    fn unseen_source_is_appended() {
        let mut target = vec![stat("numberfire", Some(15.0))];
        merge_stats(&mut target, &[stat("rotowire", Some(0.0))]);
        assert_eq!(target.len(), 2);
        assert_eq!(target[1].source, "rotowire");
        assert_eq!(target[1].projected_points, Some(0.0));
    }

    #[test]
    fn starter_flag_only_turns_on() {
        let mut target = EnrichedPlayer::new(player("LAL", "a"));
        merge_insight(&mut target, &InsightPlayer { is_starter: true, ..Default::default() });
        assert!(target.player.is_starter);
        merge_insight(&mut target, &InsightPlayer { is_starter: false, ..Default::default() });
        assert!(target.player.is_starter);
    }

    #[test]
    fn batting_order_fills_only_invalid_target() {
        let mut target = EnrichedPlayer::new(player("NYY", "a"));
        let with_order = |order: &str| InsightPlayer {
            mlb_specific: Some(MlbSpecific {
                batting_order: Some(order.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        merge_insight(&mut target, &with_order("NA"));
        assert_eq!(target.player.mlb_specific.as_ref().unwrap().batting_order, None);

        merge_insight(&mut target, &with_order("3"));
        merge_insight(&mut target, &with_order("5"));
        assert_eq!(
            target.player.mlb_specific.as_ref().unwrap().batting_order.as_deref(),
            Some("3")
        );
    }
}
