//! In-process store with the same uniqueness semantics as the Postgres schema.
//! Backs dry runs and the test suite.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::models::{
    CatalogueStats, Feed, Game, GameFilter, GameInsert, GameSource, GameWithSources, SourceInsert,
    UpdateLogEntry,
};
use super::store::SitemapStore;
use crate::identity::platform_score;

#[derive(Default)]
struct Inner {
    next_game_id: i64,
    feeds: Vec<Feed>,
    snapshots: HashMap<String, (String, usize)>,
    games: Vec<Game>,
    sources: Vec<GameSource>,
    logs: Vec<UpdateLogEntry>,
}

impl Inner {
    fn platforms_of(&self, game_id: i64) -> i32 {
        self.sources
            .iter()
            .filter(|s| s.game_id == game_id)
            .map(|s| s.domain.as_str())
            .collect::<HashSet<_>>()
            .len() as i32
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }

    pub fn log_entries(&self) -> Vec<UpdateLogEntry> {
        self.lock().map(|g| g.logs.clone()).unwrap_or_default()
    }

    pub fn sources_for(&self, game_id: i64) -> Vec<GameSource> {
        self.lock()
            .map(|g| {
                g.sources
                    .iter()
                    .filter(|s| s.game_id == game_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored url count for a domain snapshot.
    pub fn snapshot_url_count(&self, domain: &str) -> Option<usize> {
        self.lock()
            .ok()
            .and_then(|g| g.snapshots.get(domain).map(|(_, n)| *n))
    }

    /// Backdate every audit row; lets retention be exercised without waiting.
    pub fn age_logs(&self, by: Duration) {
        if let Ok(mut g) = self.lock() {
            for entry in &mut g.logs {
                entry.created_at -= by;
            }
        }
    }
}

#[async_trait]
impl SitemapStore for MemoryStore {
    async fn get_feeds(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.feeds.iter().map(|f| f.url.clone()).collect())
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        Ok(self.lock()?.feeds.clone())
    }

    async fn upsert_feed(&self, url: &str, domain: &str) -> Result<()> {
        let mut g = self.lock()?;
        let now = Utc::now();
        if let Some(feed) = g.feeds.iter_mut().find(|f| f.url == url) {
            feed.domain = domain.to_string();
            feed.updated_at = now;
        } else {
            g.feeds.push(Feed {
                url: url.to_string(),
                domain: domain.to_string(),
                created_at: now,
                updated_at: now,
            });
        }
        Ok(())
    }

    async fn remove_feed(&self, url: &str) -> Result<bool> {
        let mut g = self.lock()?;
        let before = g.feeds.len();
        g.feeds.retain(|f| f.url != url);
        Ok(g.feeds.len() != before)
    }

    async fn get_snapshot(&self, domain: &str) -> Result<Option<String>> {
        Ok(self.lock()?.snapshots.get(domain).map(|(c, _)| c.clone()))
    }

    async fn save_snapshot(&self, domain: &str, content: &str, url_count: usize) -> Result<()> {
        self.lock()?
            .snapshots
            .insert(domain.to_string(), (content.to_string(), url_count));
        Ok(())
    }

    async fn find_game_by_clean_name(&self, clean_name: &str) -> Result<Option<Game>> {
        Ok(self
            .lock()?
            .games
            .iter()
            .find(|g| g.clean_name == clean_name)
            .cloned())
    }

    async fn create_game(&self, name: &str, clean_name: &str) -> Result<GameInsert> {
        let mut g = self.lock()?;
        if let Some(existing) = g.games.iter().find(|x| x.clean_name == clean_name) {
            return Ok(GameInsert {
                game: existing.clone(),
                created: false,
            });
        }
        let now = Utc::now();
        g.next_game_id += 1;
        let game = Game {
            id: g.next_game_id,
            name: name.to_string(),
            clean_name: clean_name.to_string(),
            platform_count: 0,
            score: platform_score(0),
            first_seen: now,
            updated_at: now,
        };
        g.games.push(game.clone());
        Ok(GameInsert {
            game,
            created: true,
        })
    }

    async fn source_exists(&self, game_id: i64, domain: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .sources
            .iter()
            .any(|s| s.game_id == game_id && s.domain == domain))
    }

    async fn add_source(&self, game_id: i64, domain: &str, url: &str) -> Result<SourceInsert> {
        let mut g = self.lock()?;
        if !g.games.iter().any(|x| x.id == game_id) {
            return Err(anyhow!("game {game_id} does not exist"));
        }
        if g
            .sources
            .iter()
            .any(|s| s.game_id == game_id && s.domain == domain)
        {
            return Ok(SourceInsert::AlreadyExists);
        }
        g.sources.push(GameSource {
            game_id,
            domain: domain.to_string(),
            url: url.to_string(),
            first_seen: Utc::now(),
        });
        Ok(SourceInsert::Inserted)
    }

    async fn update_platform_stats(&self, game_id: i64) -> Result<Game> {
        let mut g = self.lock()?;
        let count = g.platforms_of(game_id);
        let game = g
            .games
            .iter_mut()
            .find(|x| x.id == game_id)
            .ok_or_else(|| anyhow!("game {game_id} does not exist"))?;
        game.platform_count = count;
        game.score = platform_score(count);
        game.updated_at = Utc::now();
        Ok(game.clone())
    }

    async fn count_platforms(&self, game_id: i64) -> Result<i32> {
        Ok(self.lock()?.platforms_of(game_id))
    }

    async fn delete_unsourced_game(&self, game_id: i64) -> Result<bool> {
        let mut g = self.lock()?;
        if g.sources.iter().any(|s| s.game_id == game_id) {
            return Ok(false);
        }
        let before = g.games.len();
        g.games.retain(|x| x.id != game_id);
        Ok(g.games.len() != before)
    }

    async fn log_batch(&self, domain: &str, urls: &[String]) -> Result<()> {
        self.lock()?.logs.push(UpdateLogEntry {
            domain: domain.to_string(),
            count: urls.len(),
            urls: urls.to_vec(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn clean_old_logs(&self, days: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let mut g = self.lock()?;
        let before = g.logs.len();
        g.logs.retain(|l| l.created_at >= cutoff);
        Ok((before - g.logs.len()) as u64)
    }

    async fn stats(&self) -> Result<CatalogueStats> {
        let g = self.lock()?;
        let platforms: HashSet<&str> = g.feeds.iter().map(|f| f.domain.as_str()).collect();
        Ok(CatalogueStats {
            total_games: g.games.len() as i64,
            total_platforms: platforms.len() as i64,
            cross_platform_games: g.games.iter().filter(|x| x.platform_count >= 2).count() as i64,
            high_score_games: g.games.iter().filter(|x| x.score >= 2.0).count() as i64,
        })
    }

    async fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameWithSources>> {
        let g = self.lock()?;
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut games: Vec<&Game> = g
            .games
            .iter()
            .filter(|x| filter.min_platforms.map_or(true, |m| x.platform_count >= m))
            .filter(|x| {
                needle
                    .as_deref()
                    .map_or(true, |n| x.name.to_lowercase().contains(n))
            })
            .filter(|x| {
                filter.domain.as_deref().map_or(true, |d| {
                    g.sources.iter().any(|s| s.game_id == x.id && s.domain == d)
                })
            })
            .collect();
        games.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.first_seen.cmp(&a.first_seen))
                .then(b.id.cmp(&a.id))
        });

        Ok(games
            .into_iter()
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .map(|game| GameWithSources {
                game: game.clone(),
                sources: g
                    .sources
                    .iter()
                    .filter(|s| s.game_id == game.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }
}
