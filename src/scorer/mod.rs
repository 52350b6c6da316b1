pub mod percentile;

pub use percentile::PercentileScorer;
