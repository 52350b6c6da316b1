//! Alternate-name resolution for upstream player names that do not match the
//! contest roster spelling.

pub mod models;
pub mod resolver;

use async_trait::async_trait;

use crate::types::{ContestCategory, Sport};

pub use resolver::CachedNameResolver;

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// False when the backing store is unavailable; reload/save become no-ops.
    fn is_valid(&self) -> bool;

    /// Refresh the in-memory alternate/missing names from storage. Called once
    /// per refresh cycle before any contest is merged.
    async fn reload(&self);

    /// Flush accumulated changes. Called once after a cycle's merges finish.
    async fn save_updates(&self);

    /// Canonical roster name for an upstream name, if one is curated.
    fn alternate_name(&self, name: &str) -> Option<String>;

    fn alternate_name_used(&self, name: &str);

    fn add_missing_name(&self, category: ContestCategory, sport: Sport, name: &str, team: &str);
}

/// Exact-match-only fallback when no name store is configured.
pub struct NoopNameResolver;

#[async_trait]
impl NameResolver for NoopNameResolver {
    fn is_valid(&self) -> bool {
        false
    }

    async fn reload(&self) {}

    async fn save_updates(&self) {}

    fn alternate_name(&self, _name: &str) -> Option<String> {
        None
    }

    fn alternate_name_used(&self, _name: &str) {}

    fn add_missing_name(&self, _category: ContestCategory, _sport: Sport, _name: &str, _team: &str) {}
}
