use crate::error::{AppError, Result};
use crate::types::ContestCategory;

pub const PROVIDER_URL: &str = "http://127.0.0.1:8080";

/// Channel capacity for refresh commands (timer fires + external triggers).
pub const CHANNEL_CAPACITY: usize = 256;

/// Scheduling windows for the player-insight timer, measured as time remaining
/// until contest start.
pub mod player_insight_windows {
    /// Above this, refresh on 14-hour multiples counted back from start.
    pub const LONG_RANGE_HOURS: i64 = 15;
    pub const LONG_RANGE_STEP_HOURS: i64 = 14;
    /// Above this, refresh at the top of the next hour.
    pub const HOURLY_MINUTES: i64 = 90;
    /// Above this, refresh on the next quarter-hour boundary.
    pub const QUARTER_HOUR_MINUTES: i64 = 15;
    /// Above this, one last refresh 5 minutes before lock. At or below: none.
    pub const FINAL_MINUTES: i64 = 6;
    pub const FINAL_LEAD_MINUTES: i64 = 5;
}

/// Team defense numbers move slowly.
pub const TEAM_INSIGHT_INTERVAL_HOURS: i64 = 6;

/// Likeability is the sum of these scaled percentiles (max 100).
pub mod likeability_scales {
    pub const PROJECTED_POINTS: f64 = 40.0;
    pub const POINTS_PER_DOLLAR: f64 = 40.0;
    pub const RECENT_AVERAGE: f64 = 15.0;
    pub const SEASON_AVERAGE: f64 = 5.0;
}

/// Scale for per-position-label percentiles and team defense percentiles.
pub const POSITION_PERCENTILE_SCALE: f64 = 100.0;

/// DraftKings and FanDuel salaries are in dollars, Yahoo salaries are already
/// in thousands.
pub fn points_per_dollar_multiplier(category: ContestCategory) -> f64 {
    match category {
        ContestCategory::DraftKings => 1000.0,
        ContestCategory::FanDuel => 1000.0,
        ContestCategory::Yahoo => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider_url: String,
    pub provider_timeout_secs: u64,
    pub log_level: String,
    pub api_port: u16,
    /// SQLite file holding curated alternate names and reported missing names
    /// (NAMES_DB_PATH). None disables fuzzy name resolution.
    pub names_db_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            provider_url: std::env::var("PROVIDER_URL")
                .unwrap_or_else(|_| PROVIDER_URL.to_string()),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            names_db_path: std::env::var("NAMES_DB_PATH")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}
