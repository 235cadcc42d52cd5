use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A sitemap under monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Feed {
    pub url: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical cross-domain game identity.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Game {
    pub id: i64,
    /// Display name from the first observation.
    pub name: String,
    /// Identity key; unique across the catalogue.
    pub clean_name: String,
    pub platform_count: i32,
    pub score: f64,
    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One hosting domain for a game. First URL seen for the domain wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct GameSource {
    pub game_id: i64,
    pub domain: String,
    pub url: String,
    pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameWithSources {
    #[serde(flatten)]
    pub game: Game,
    pub sources: Vec<GameSource>,
}

/// Outcome of the insert-or-fetch game primitive.
#[derive(Debug, Clone)]
pub struct GameInsert {
    pub game: Game,
    /// `false` when another writer already owned the clean name.
    pub created: bool,
}

/// Outcome of the insert-if-absent source primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceInsert {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogueStats {
    pub total_games: i64,
    pub total_platforms: i64,
    pub cross_platform_games: i64,
    pub high_score_games: i64,
}

#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub min_platforms: Option<i32>,
    pub domain: Option<String>,
    /// Case-insensitive substring of the display name.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl GameFilter {
    pub const DEFAULT_LIMIT: i64 = 50;

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).max(0)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Audit record for one diff batch. Written, never read back by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateLogEntry {
    pub domain: String,
    pub count: usize,
    pub urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}
