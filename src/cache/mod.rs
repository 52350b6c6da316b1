pub mod contest_cache;
pub mod insight_cache;

pub use contest_cache::ContestCache;
pub use insight_cache::{PlayerInsightCache, TeamInsightCache};
