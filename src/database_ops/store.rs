use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    CatalogueStats, Feed, Game, GameFilter, GameInsert, GameWithSources, SourceInsert,
};

/// Storage contract consumed by the monitor.
///
/// Uniqueness is the only concurrency control: `create_game` and `add_source`
/// are insert-or-fetch primitives, so concurrent writers converge on the same
/// rows instead of erroring.
#[async_trait]
pub trait SitemapStore: Send + Sync {
    /// Feed URLs in creation order.
    async fn get_feeds(&self) -> Result<Vec<String>>;
    async fn list_feeds(&self) -> Result<Vec<Feed>>;
    /// Insert the feed, or refresh `updated_at` when the URL is already present.
    async fn upsert_feed(&self, url: &str, domain: &str) -> Result<()>;
    /// `true` when a row was removed. Games and snapshots are kept.
    async fn remove_feed(&self, url: &str) -> Result<bool>;

    async fn get_snapshot(&self, domain: &str) -> Result<Option<String>>;
    /// Replace the stored snapshot for `domain`.
    async fn save_snapshot(&self, domain: &str, content: &str, url_count: usize) -> Result<()>;

    async fn find_game_by_clean_name(&self, clean_name: &str) -> Result<Option<Game>>;
    /// Insert a game, or return the row that already owns `clean_name`.
    async fn create_game(&self, name: &str, clean_name: &str) -> Result<GameInsert>;
    async fn source_exists(&self, game_id: i64, domain: &str) -> Result<bool>;
    async fn add_source(&self, game_id: i64, domain: &str, url: &str) -> Result<SourceInsert>;
    /// Recount distinct source domains, recompute the score, persist both.
    async fn update_platform_stats(&self, game_id: i64) -> Result<Game>;
    /// Distinct source domains currently recorded for the game.
    async fn count_platforms(&self, game_id: i64) -> Result<i32>;
    /// Remove a game that has no sources. `false` when it has sources or is gone.
    async fn delete_unsourced_game(&self, game_id: i64) -> Result<bool>;

    /// Append an audit row for one diff batch.
    async fn log_batch(&self, domain: &str, urls: &[String]) -> Result<()>;
    /// Delete audit rows older than `days`; returns the number removed.
    async fn clean_old_logs(&self, days: u32) -> Result<u64>;

    async fn stats(&self) -> Result<CatalogueStats>;
    async fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameWithSources>>;
}
