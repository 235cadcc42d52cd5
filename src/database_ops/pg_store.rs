use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row};
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::db::Db;
use super::models::{
    CatalogueStats, Feed, Game, GameFilter, GameInsert, GameSource, GameWithSources, SourceInsert,
};
use super::store::SitemapStore;
use crate::identity::platform_score;

const GAME_COLUMNS: &str = "id, name, clean_name, platform_count, score, first_seen, updated_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl SitemapStore for PgStore {
    async fn get_feeds(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>(
            "SELECT url FROM feeds ORDER BY created_at ASC, id ASC",
        )
        .persistent(false)
        .fetch_all(&self.db.pool)
        .await
        .context("loading feeds")?;
        Ok(urls)
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT url, domain, created_at, updated_at FROM feeds ORDER BY created_at ASC, id ASC",
        )
        .persistent(false)
        .fetch_all(&self.db.pool)
        .await
        .context("listing feeds")?;
        Ok(feeds)
    }

    #[instrument(skip(self))]
    async fn upsert_feed(&self, url: &str, domain: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO feeds (url, domain) VALUES ($1, $2) \
             ON CONFLICT (url) DO UPDATE SET domain = EXCLUDED.domain, updated_at = now()",
        )
        .persistent(false)
        .bind(url)
        .bind(domain)
        .execute(&self.db.pool)
        .await
        .context("upserting feed")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_feed(&self, url: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM feeds WHERE url = $1")
            .persistent(false)
            .bind(url)
            .execute(&self.db.pool)
            .await
            .context("removing feed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_snapshot(&self, domain: &str) -> Result<Option<String>> {
        let content =
            sqlx::query_scalar::<_, String>("SELECT content FROM sitemaps WHERE domain = $1")
                .persistent(false)
                .bind(domain)
                .fetch_optional(&self.db.pool)
                .await
                .context("loading sitemap snapshot")?;
        Ok(content)
    }

    #[instrument(skip(self, content))]
    async fn save_snapshot(&self, domain: &str, content: &str, url_count: usize) -> Result<()> {
        let url_count = i32::try_from(url_count).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO sitemaps (domain, content, url_count, updated_at) VALUES ($1, $2, $3, now()) \
             ON CONFLICT (domain) DO UPDATE \
               SET content = EXCLUDED.content, url_count = EXCLUDED.url_count, updated_at = now()",
        )
        .persistent(false)
        .bind(domain)
        .bind(content)
        .bind(url_count)
        .execute(&self.db.pool)
        .await
        .context("saving sitemap snapshot")?;
        Ok(())
    }

    async fn find_game_by_clean_name(&self, clean_name: &str) -> Result<Option<Game>> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE clean_name = $1");
        let game = sqlx::query_as::<_, Game>(&sql)
            .persistent(false)
            .bind(clean_name)
            .fetch_optional(&self.db.pool)
            .await
            .context("looking up game by clean name")?;
        Ok(game)
    }

    #[instrument(skip(self))]
    async fn create_game(&self, name: &str, clean_name: &str) -> Result<GameInsert> {
        // ON CONFLICT DO NOTHING returns no row when another writer owns the key;
        // re-read the winner instead of surfacing the conflict.
        let insert = format!(
            "INSERT INTO games (name, clean_name, platform_count, score) VALUES ($1, $2, 0, $3) \
             ON CONFLICT (clean_name) DO NOTHING \
             RETURNING {GAME_COLUMNS}"
        );
        if let Some(game) = sqlx::query_as::<_, Game>(&insert)
            .persistent(false)
            .bind(name)
            .bind(clean_name)
            .bind(platform_score(0))
            .fetch_optional(&self.db.pool)
            .await
            .context("inserting game")?
        {
            return Ok(GameInsert { game, created: true });
        }

        debug!(clean_name, "game already present; re-reading winner");
        let game = self
            .find_game_by_clean_name(clean_name)
            .await?
            .ok_or_else(|| anyhow!("game {clean_name} conflicted on insert but is not readable"))?;
        Ok(GameInsert { game, created: false })
    }

    async fn source_exists(&self, game_id: i64, domain: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM game_sources WHERE game_id = $1 AND domain = $2)",
        )
        .persistent(false)
        .bind(game_id)
        .bind(domain)
        .fetch_one(&self.db.pool)
        .await
        .context("checking game source")?;
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn add_source(&self, game_id: i64, domain: &str, url: &str) -> Result<SourceInsert> {
        let inserted = sqlx::query(
            "INSERT INTO game_sources (game_id, domain, url) VALUES ($1, $2, $3) \
             ON CONFLICT (game_id, domain) DO NOTHING \
             RETURNING id",
        )
        .persistent(false)
        .bind(game_id)
        .bind(domain)
        .bind(url)
        .fetch_optional(&self.db.pool)
        .await
        .context("inserting game source")?;
        Ok(match inserted {
            Some(_) => SourceInsert::Inserted,
            None => SourceInsert::AlreadyExists,
        })
    }

    #[instrument(skip(self))]
    async fn update_platform_stats(&self, game_id: i64) -> Result<Game> {
        let count = self.count_platforms(game_id).await?;

        let sql = format!(
            "UPDATE games SET platform_count = $2, score = $3, updated_at = now() \
             WHERE id = $1 RETURNING {GAME_COLUMNS}"
        );
        let game = sqlx::query_as::<_, Game>(&sql)
            .persistent(false)
            .bind(game_id)
            .bind(count)
            .bind(platform_score(count))
            .fetch_one(&self.db.pool)
            .await
            .context("persisting platform stats")?;
        Ok(game)
    }

    async fn count_platforms(&self, game_id: i64) -> Result<i32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT domain) FROM game_sources WHERE game_id = $1",
        )
        .persistent(false)
        .bind(game_id)
        .fetch_one(&self.db.pool)
        .await
        .context("counting game platforms")?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn delete_unsourced_game(&self, game_id: i64) -> Result<bool> {
        let res = sqlx::query(
            "DELETE FROM games g WHERE g.id = $1 \
             AND NOT EXISTS (SELECT 1 FROM game_sources s WHERE s.game_id = g.id)",
        )
        .persistent(false)
        .bind(game_id)
        .execute(&self.db.pool)
        .await
        .context("deleting unsourced game")?;
        Ok(res.rows_affected() > 0)
    }

    async fn log_batch(&self, domain: &str, urls: &[String]) -> Result<()> {
        let count = i32::try_from(urls.len()).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO update_logs (domain, new_urls_count, new_urls) VALUES ($1, $2, $3)",
        )
        .persistent(false)
        .bind(domain)
        .bind(count)
        .bind(urls)
        .execute(&self.db.pool)
        .await
        .context("recording update log")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_old_logs(&self, days: u32) -> Result<u64> {
        let days = i32::try_from(days).unwrap_or(i32::MAX);
        let res = sqlx::query(
            "DELETE FROM update_logs WHERE created_at < now() - make_interval(days => $1)",
        )
        .persistent(false)
        .bind(days)
        .execute(&self.db.pool)
        .await
        .context("cleaning old update logs")?;
        Ok(res.rows_affected())
    }

    async fn stats(&self) -> Result<CatalogueStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM games) AS total_games,
                (SELECT COUNT(DISTINCT domain) FROM feeds) AS total_platforms,
                (SELECT COUNT(*) FROM games WHERE platform_count >= 2) AS cross_platform_games,
                (SELECT COUNT(*) FROM games WHERE score >= 2.0) AS high_score_games
            "#,
        )
        .persistent(false)
        .fetch_one(&self.db.pool)
        .await
        .context("loading catalogue stats")?;

        Ok(CatalogueStats {
            total_games: row.get("total_games"),
            total_platforms: row.get("total_platforms"),
            cross_platform_games: row.get("cross_platform_games"),
            high_score_games: row.get("high_score_games"),
        })
    }

    async fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameWithSources>> {
        let mut qb: QueryBuilder<'_, sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {GAME_COLUMNS} FROM games g WHERE TRUE"));
        if let Some(min) = filter.min_platforms {
            qb.push(" AND g.platform_count >= ").push_bind(min);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND g.name ILIKE ")
                .push_bind(format!("%{}%", escape_like(search.trim())));
        }
        if let Some(domain) = filter.domain.as_deref() {
            qb.push(" AND EXISTS (SELECT 1 FROM game_sources s WHERE s.game_id = g.id AND s.domain = ")
                .push_bind(domain.to_string())
                .push(")");
        }
        qb.push(" ORDER BY g.score DESC, g.first_seen DESC, g.id DESC LIMIT ")
            .push_bind(filter.effective_limit())
            .push(" OFFSET ")
            .push_bind(filter.effective_offset());

        let games: Vec<Game> = qb
            .build_query_as::<Game>()
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await
            .context("listing games")?;
        if games.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = games.iter().map(|g| g.id).collect();
        let sources = sqlx::query_as::<_, GameSource>(
            "SELECT game_id, domain, url, first_seen FROM game_sources \
             WHERE game_id = ANY($1) ORDER BY first_seen ASC, id ASC",
        )
        .persistent(false)
        .bind(&ids)
        .fetch_all(&self.db.pool)
        .await
        .context("loading game sources")?;

        let mut by_game: HashMap<i64, Vec<GameSource>> = HashMap::new();
        for s in sources {
            by_game.entry(s.game_id).or_default().push(s);
        }
        Ok(games
            .into_iter()
            .map(|game| {
                let sources = by_game.remove(&game.id).unwrap_or_default();
                GameWithSources { game, sources }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_fun"), "100\\%\\_fun");
        assert_eq!(escape_like("plain"), "plain");
    }
}
