use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::{error, info, warn};

use super::models::{AlternateName, MissingName};
use super::NameResolver;
use crate::error::Result;
use crate::types::{ContestCategory, Sport};

#[derive(Debug, Default)]
struct NameCache {
    /// lowercased external name → alternate name
    alternate: HashMap<String, AlternateName>,
    /// lowercased upstream name → missing name
    missing: HashMap<String, MissingName>,
    alternate_dirty: bool,
    missing_dirty: bool,
}

/// In-memory alternate/missing name cache, optionally backed by SQLite.
///
/// Without a pool the resolver still answers lookups and counts missing names
/// for the life of the process, but `is_valid()` is false and reload/save are
/// skipped.
pub struct CachedNameResolver {
    pool: Option<SqlitePool>,
    cache: Mutex<NameCache>,
}

impl CachedNameResolver {
    pub fn detached() -> Self {
        Self {
            pool: None,
            cache: Mutex::new(NameCache::default()),
        }
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool: Some(pool),
            cache: Mutex::new(NameCache::default()),
        }
    }

    /// Open (creating if needed) the SQLite file at `path` and run migrations.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Name store ready at {path}");
        Ok(Self::with_pool(pool))
    }

    async fn load(pool: &SqlitePool) -> Result<(Vec<AlternateName>, Vec<MissingName>)> {
        let alternate = sqlx::query_as::<_, AlternateName>(
            "SELECT external_name, contest_name, last_used FROM alternate_names",
        )
        .fetch_all(pool)
        .await?;
        let missing = sqlx::query_as::<_, MissingName>(
            "SELECT name, team, category, sport, count FROM missing_names",
        )
        .fetch_all(pool)
        .await?;
        Ok((alternate, missing))
    }

    async fn write_alternate_names(pool: &SqlitePool, names: &[AlternateName]) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM alternate_names").execute(&mut *tx).await?;
        for name in names {
            sqlx::query(
                "INSERT INTO alternate_names (external_name, contest_name, last_used) VALUES (?, ?, ?)",
            )
            .bind(&name.external_name)
            .bind(&name.contest_name)
            .bind(name.last_used)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_missing_names(pool: &SqlitePool, names: &[MissingName]) -> Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM missing_names").execute(&mut *tx).await?;
        for name in names {
            sqlx::query(
                "INSERT INTO missing_names (name, team, category, sport, count) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&name.name)
            .bind(&name.team)
            .bind(&name.category)
            .bind(&name.sport)
            .bind(name.count)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl NameResolver for CachedNameResolver {
    fn is_valid(&self) -> bool {
        self.pool.is_some()
    }

    async fn reload(&self) {
        let Some(pool) = self.pool.as_ref() else {
            info!("Skipped loading alternate and missing names: no name store configured");
            return;
        };
        info!("Reloading the cache of alternate and missing names");
        let (alternate, missing) = match Self::load(pool).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Could not reload alternate and missing names: {e}");
                return;
            }
        };

        let mut alternate: HashMap<String, AlternateName> = alternate
            .into_iter()
            .filter(|a| !a.external_name.is_empty() && !a.contest_name.is_empty())
            .map(|a| (a.external_name.to_lowercase(), a))
            .collect();
        let mut missing: HashMap<String, MissingName> = missing
            .into_iter()
            .filter(|m| !m.name.is_empty())
            .map(|m| (m.name.to_lowercase(), m))
            .collect();

        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        // Unsaved changes outlive a reload; the next save writes them.
        if cache.alternate_dirty {
            for (key, stored) in alternate.iter_mut() {
                if let Some(current) = cache.alternate.get(key) {
                    stored.last_used = stored.last_used.max(current.last_used);
                }
            }
        }
        if cache.missing_dirty {
            missing.extend(cache.missing.drain());
        }
        cache.alternate = alternate;
        cache.missing = missing;
        info!(
            alternate = cache.alternate.len(),
            missing = cache.missing.len(),
            "Reloaded the cache of alternate and missing names",
        );
    }

    async fn save_updates(&self) {
        let Some(pool) = self.pool.as_ref() else {
            info!("Skipped saving alternate and missing names: no name store configured");
            return;
        };

        let (alternate, missing) = {
            let Ok(mut cache) = self.cache.lock() else {
                return;
            };
            let alternate = cache
                .alternate_dirty
                .then(|| cache.alternate.values().cloned().collect::<Vec<_>>());
            let missing = cache
                .missing_dirty
                .then(|| cache.missing.values().cloned().collect::<Vec<_>>());
            cache.alternate_dirty = false;
            cache.missing_dirty = false;
            (alternate, missing)
        };

        if let Some(names) = alternate {
            info!(count = names.len(), "Saving updates to the alternate names");
            if let Err(e) = Self::write_alternate_names(pool, &names).await {
                error!("Could not save alternate names: {e}");
            }
        }
        if let Some(names) = missing {
            info!(count = names.len(), "Saving updates to the missing names");
            if let Err(e) = Self::write_missing_names(pool, &names).await {
                error!("Could not save missing names: {e}");
            }
        }
    }

    fn alternate_name(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        let cache = self.cache.lock().ok()?;
        cache
            .alternate
            .get(&name.to_lowercase())
            .map(|a| a.contest_name.clone())
    }

    fn alternate_name_used(&self, name: &str) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        if let Some(alternate) = cache.alternate.get_mut(&name.to_lowercase()) {
            alternate.last_used = Some(Utc::now());
            cache.alternate_dirty = true;
        }
    }

    fn add_missing_name(&self, category: ContestCategory, sport: Sport, name: &str, team: &str) {
        let Ok(mut cache) = self.cache.lock() else {
            warn!("Name cache lock poisoned; dropped missing name {name} ({team})");
            return;
        };
        cache
            .missing
            .entry(name.to_lowercase())
            .and_modify(|m| {
                m.count += 1;
                m.team = Some(team.to_string());
                m.category = Some(category.to_string());
                m.sport = Some(sport.to_string());
            })
            .or_insert_with(|| MissingName {
                name: name.to_string(),
                team: Some(team.to_string()),
                category: Some(category.to_string()),
                sport: Some(sport.to_string()),
                count: 1,
            });
        cache.missing_dirty = true;
    }
}

#[cfg(test)]
impl CachedNameResolver {
    pub fn insert_alternate_name(&self, external_name: &str, contest_name: &str) {
        let mut cache = self.cache.lock().unwrap();
        cache.alternate.insert(
            external_name.to_lowercase(),
            AlternateName {
                external_name: external_name.to_string(),
                contest_name: contest_name.to_string(),
                last_used: None,
            },
        );
        cache.alternate_dirty = true;
    }

    pub fn missing_names(&self) -> Vec<MissingName> {
        let cache = self.cache.lock().unwrap();
        let mut names: Vec<MissingName> = cache.missing.values().cloned().collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));
        names
    }

    pub fn last_used(&self, external_name: &str) -> Option<chrono::DateTime<Utc>> {
        let cache = self.cache.lock().unwrap();
        cache.alternate.get(&external_name.to_lowercase())?.last_used
    }
}

/// Migrated in-memory store. One connection, so every handle sees the same
/// database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_lookup_is_case_insensitive() {
        let resolver = CachedNameResolver::detached();
        resolver.insert_alternate_name("LeBron", "lebron james");
        assert_eq!(resolver.alternate_name("lebron").as_deref(), Some("lebron james"));
        assert_eq!(resolver.alternate_name("LEBRON").as_deref(), Some("lebron james"));
        assert_eq!(resolver.alternate_name(""), None);
        assert_eq!(resolver.alternate_name("kobe"), None);
    }

    #[test]
    fn alternate_name_used_stamps_last_used() {
        let resolver = CachedNameResolver::detached();
        resolver.insert_alternate_name("lebron", "lebron james");
        assert!(resolver.last_used("lebron").is_none());
        resolver.alternate_name_used("Lebron");
        assert!(resolver.last_used("lebron").is_some());
    }

    #[test]
    fn repeated_missing_names_increment_count() {
        let resolver = CachedNameResolver::detached();
        resolver.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "Lebron", "LAL");
        resolver.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "lebron", "CLE");
        resolver.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "Kobe", "LAL");

        let missing = resolver.missing_names();
        assert_eq!(missing.len(), 2);
        let lebron = missing.iter().find(|m| m.name == "Lebron").unwrap();
        assert_eq!(lebron.count, 2);
        assert_eq!(lebron.team.as_deref(), Some("CLE"));
        assert_eq!(lebron.sport.as_deref(), Some("nba"));
    }

    #[tokio::test]
    async fn detached_resolver_skips_persistence() {
        let resolver = CachedNameResolver::detached();
        assert!(!resolver.is_valid());
        resolver.insert_alternate_name("a", "b");
        resolver.reload().await;
        resolver.save_updates().await;
        assert_eq!(resolver.alternate_name("a").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn saved_names_survive_reload() {
        let pool = memory_pool().await;
        let writer = CachedNameResolver::with_pool(pool.clone());
        writer.insert_alternate_name("lebron", "lebron james");
        writer.add_missing_name(ContestCategory::DraftKings, Sport::Nba, "Bron", "LAL");
        writer.save_updates().await;

        let reader = CachedNameResolver::with_pool(pool);
        assert!(reader.is_valid());
        reader.reload().await;
        assert_eq!(reader.alternate_name("LeBron").as_deref(), Some("lebron james"));
        let missing = reader.missing_names();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].count, 1);
        assert_eq!(missing[0].category.as_deref(), Some("draftkings"));
    }

    #[tokio::test]
    async fn reload_keeps_unsaved_missing_names() {
        let pool = memory_pool().await;
        let seed = CachedNameResolver::with_pool(pool.clone());
        seed.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "Kobe", "LAL");
        seed.save_updates().await;

        let resolver = CachedNameResolver::with_pool(pool.clone());
        resolver.reload().await;
        resolver.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "Bron", "LAL");
        resolver.add_missing_name(ContestCategory::FanDuel, Sport::Nba, "kobe", "LAL");
        resolver.reload().await;

        let missing = resolver.missing_names();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing.iter().find(|m| m.name == "Bron").unwrap().count, 1);
        assert_eq!(missing.iter().find(|m| m.name == "Kobe").unwrap().count, 2);

        resolver.save_updates().await;
        let stored = CachedNameResolver::with_pool(pool);
        stored.reload().await;
        assert_eq!(stored.missing_names().len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_unsaved_last_used() {
        let pool = memory_pool().await;
        let seed = CachedNameResolver::with_pool(pool.clone());
        seed.insert_alternate_name("bron", "lebron james");
        seed.save_updates().await;

        let resolver = CachedNameResolver::with_pool(pool.clone());
        resolver.reload().await;
        resolver.alternate_name_used("bron");
        resolver.reload().await;
        assert!(resolver.last_used("bron").is_some());

        resolver.save_updates().await;
        let stored = CachedNameResolver::with_pool(pool);
        stored.reload().await;
        assert!(stored.last_used("bron").is_some());
    }
}
