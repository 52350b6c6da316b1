use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contest category / sport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestCategory {
    DraftKings,
    FanDuel,
    Yahoo,
}

impl std::fmt::Display for ContestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContestCategory::DraftKings => "draftkings",
            ContestCategory::FanDuel => "fanduel",
            ContestCategory::Yahoo => "yahoo",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Nfl,
    Mlb,
    Nhl,
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sport::Nba => "nba",
            Sport::Nfl => "nfl",
            Sport::Mlb => "mlb",
            Sport::Nhl => "nhl",
        };
        write!(f, "{s}")
    }
}

/// Composite key for every per-(category, sport) cache cell and timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsightKey {
    pub category: ContestCategory,
    pub sport: Sport,
}

impl InsightKey {
    pub fn new(category: ContestCategory, sport: Sport) -> Self {
        Self { category, sport }
    }
}

impl std::fmt::Display for InsightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.sport)
    }
}

// ---------------------------------------------------------------------------
// Contest (as fetched from the upstream provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub id: String,
    pub category: ContestCategory,
    pub sport: Sport,
    pub label: String,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub games: Vec<Game>,
    /// Lineup slots, e.g. `{ label: "FLEX", eligiblePlayerPositions: ["RB", "WR", "TE"] }`.
    #[serde(default)]
    pub positions: Vec<PositionSlot>,
}

impl Contest {
    pub fn key(&self) -> InsightKey {
        InsightKey::new(self.category, self.sport)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub away_team: Team,
    pub home_team: Team,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub code: String,
    #[serde(default)]
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSlot {
    pub label: String,
    #[serde(default)]
    pub eligible_player_positions: Vec<String>,
}

/// Contest-native player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub team: String,
    pub position: String,
    pub salary: Option<f64>,
    #[serde(default)]
    pub is_starter: bool,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
    #[serde(default)]
    pub mlb_specific: Option<MlbSpecific>,
}

/// One projection source's numbers for a player.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    pub source: String,
    pub projected_points: Option<f64>,
    pub projected_ceiling: Option<f64>,
    pub projected_floor: Option<f64>,
    pub recent_average_points: Option<f64>,
    pub season_average_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlbSpecific {
    pub batting_order: Option<String>,
    pub handedness_bat: Option<String>,
    pub handedness_throw: Option<String>,
    #[serde(default)]
    pub is_probable_pitcher: bool,
}

// ---------------------------------------------------------------------------
// Insight feeds: shared across every contest of a (category, sport)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightPlayer {
    pub name: Option<String>,
    pub team: Option<String>,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
    #[serde(default)]
    pub is_starter: bool,
    #[serde(default)]
    pub mlb_specific: Option<MlbSpecific>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightTeam {
    pub code: String,
    #[serde(default)]
    pub points_allowed_per_position: Vec<PositionPoints>,
}

/// Fantasy points a defense allows to one position label (or a synthetic
/// handedness label such as `BAT-L` / `PITCH-R`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPoints {
    pub position: Option<String>,
    pub points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCard {
    #[serde(default)]
    pub game_log: Vec<serde_json::Value>,
    #[serde(default)]
    pub news: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Enriched views: rebuilt per contest on every refresh, served to clients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedContest {
    pub id: String,
    pub category: ContestCategory,
    pub sport: Sport,
    pub label: String,
    pub start_time: Option<DateTime<Utc>>,
    pub games: Vec<EnrichedGame>,
    pub positions: Vec<PositionSlot>,
    pub player_data_last_update_time: Option<DateTime<Utc>>,
    pub player_data_next_update_time: Option<DateTime<Utc>>,
}

impl EnrichedContest {
    /// Fresh, un-merged working copy of a fetched contest.
    pub fn from_contest(contest: &Contest) -> Self {
        Self {
            id: contest.id.clone(),
            category: contest.category,
            sport: contest.sport,
            label: contest.label.clone(),
            start_time: contest.start_time,
            games: contest
                .games
                .iter()
                .map(|g| EnrichedGame {
                    away_team: EnrichedTeam::from_team(&g.away_team),
                    home_team: EnrichedTeam::from_team(&g.home_team),
                    start_time: g.start_time,
                })
                .collect(),
            positions: contest.positions.clone(),
            player_data_last_update_time: None,
            player_data_next_update_time: None,
        }
    }

    pub fn players(&self) -> impl Iterator<Item = &EnrichedPlayer> {
        self.games
            .iter()
            .flat_map(|g| [&g.away_team, &g.home_team])
            .flat_map(|t| t.players.iter())
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut EnrichedPlayer> {
        self.games
            .iter_mut()
            .flat_map(|g| [&mut g.away_team, &mut g.home_team])
            .flat_map(|t| t.players.iter_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedGame {
    pub away_team: EnrichedTeam,
    pub home_team: EnrichedTeam,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTeam {
    pub code: String,
    pub players: Vec<EnrichedPlayer>,
}

impl EnrichedTeam {
    fn from_team(team: &Team) -> Self {
        Self {
            code: team.code.clone(),
            players: team.players.iter().cloned().map(EnrichedPlayer::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPlayer {
    #[serde(flatten)]
    pub player: Player,
    pub is_playing: bool,
    pub likeability: f64,
    pub opponent: Option<String>,
    pub opposition_percentile: Option<f64>,
    pub projected_points: Option<f64>,
    pub projected_ceiling: Option<f64>,
    pub projected_floor: Option<f64>,
    pub projected_points_per_dollar: Option<f64>,
    pub recent_average_points: Option<f64>,
    pub season_average_points: Option<f64>,
    pub projected_points_percentiles: Vec<PositionPercentile>,
    pub projected_points_per_dollar_percentiles: Vec<PositionPercentile>,
}

impl EnrichedPlayer {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            is_playing: false,
            likeability: 0.0,
            opponent: None,
            opposition_percentile: None,
            projected_points: None,
            projected_ceiling: None,
            projected_floor: None,
            projected_points_per_dollar: None,
            recent_average_points: None,
            season_average_points: None,
            projected_points_percentiles: Vec::new(),
            projected_points_per_dollar_percentiles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionPercentile {
    pub position: String,
    pub percentile: f64,
}
