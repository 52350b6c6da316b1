pub mod analytics;
pub mod contest_merge;
pub mod player_index;
pub mod team_defense;

pub use contest_merge::merge_contest;
