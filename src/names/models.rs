use chrono::{DateTime, Utc};

/// Curated mapping from an upstream name variant to the contest roster name.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AlternateName {
    pub external_name: String,
    pub contest_name: String,
    pub last_used: Option<DateTime<Utc>>,
}

/// Upstream name that matched no roster player of a team in its contest.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MissingName {
    pub name: String,
    pub team: Option<String>,
    pub category: Option<String>,
    pub sport: Option<String>,
    pub count: i64,
}
