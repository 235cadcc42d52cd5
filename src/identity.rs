//! Cross-platform identity resolution.
//!
//! A game is identified purely by its clean name. Each observation of
//! `(name, clean_name, domain, url)` either creates the game, attaches a new
//! hosting domain to it, or is a no-op when the `(game, domain)` pair is
//! already known.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database_ops::models::{Game, SourceInsert};
use crate::database_ops::store::SitemapStore;

/// Platforms beyond the first that still raise the score.
const SCORE_PLATFORM_CAP: i32 = 3;
const SCORE_STEP: f64 = 0.5;

/// Popularity score for a platform count: 1 → 1.0, 2 → 1.5, 3 → 2.0, 4+ → 2.5.
///
/// Monotonic and capped. Counts below one score as a single platform.
pub fn platform_score(platform_count: i32) -> f64 {
    let extra = (platform_count.max(1) - 1).min(SCORE_PLATFORM_CAP);
    1.0 + f64::from(extra) * SCORE_STEP
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// This call created the game.
    pub is_new: bool,
    /// This call attached a new hosting domain to an existing game.
    pub is_cross_platform: bool,
    pub game: Game,
}

impl Resolution {
    /// Worth reporting: a brand-new game or a new platform for a known one.
    pub fn is_discovery(&self) -> bool {
        self.is_new || self.is_cross_platform
    }
}

/// Merge one observation into the catalogue.
///
/// Concurrency relies on the store's uniqueness: losing a create race
/// converges on the winner's row, and a duplicate `(game, domain)` source is a
/// no-op. A game created here is removed again if its first source cannot be
/// recorded. Stats are recounted whenever the stored `platform_count` lags
/// the source table, so an interrupted recount heals on the next observation.
pub async fn upsert_game<S: SitemapStore + ?Sized>(
    store: &S,
    name: &str,
    clean_name: &str,
    domain: &str,
    url: &str,
) -> Result<Resolution> {
    let (game, found, is_new) = match store
        .find_game_by_clean_name(clean_name)
        .await
        .context("finding game")?
    {
        Some(game) => (game, true, false),
        None => {
            let insert = store
                .create_game(name, clean_name)
                .await
                .context("creating game")?;
            if !insert.created {
                debug!(clean_name, "lost create race; using existing game");
            }
            (insert.game, false, insert.created)
        }
    };

    // Only a game that was already catalogued can gain a new platform here.
    let new_platform = found
        && !store
            .source_exists(game.id, domain)
            .await
            .context("checking game source")?;

    let inserted = match store.add_source(game.id, domain, url).await {
        Ok(res) => res == SourceInsert::Inserted,
        Err(e) => {
            if is_new {
                discard_unsourced(store, game.id, clean_name).await;
            }
            return Err(e).context("adding game source");
        }
    };

    let stale = !inserted
        && store
            .count_platforms(game.id)
            .await
            .context("counting game platforms")?
            != game.platform_count;

    let game = if inserted || stale {
        if stale {
            debug!(clean_name, "platform count out of date; recounting");
        }
        store
            .update_platform_stats(game.id)
            .await
            .context("updating platform stats")?
    } else {
        game
    };

    // A concurrent observation may have claimed the (game, domain) pair between
    // the existence check and the insert; only the writer that inserted reports it.
    let is_cross_platform = new_platform && inserted && game.platform_count >= 2;

    if is_cross_platform {
        info!(
            game = %game.clean_name,
            domain,
            platforms = game.platform_count,
            score = game.score,
            "game seen on a new platform"
        );
    }

    Ok(Resolution {
        is_new,
        is_cross_platform,
        game,
    })
}

async fn discard_unsourced<S>(store: &S, game_id: i64, clean_name: &str)
where
    S: SitemapStore + ?Sized,
{
    match store.delete_unsourced_game(game_id).await {
        Ok(true) => debug!(clean_name, "discarded game without a source"),
        Ok(false) => {}
        Err(e) => warn!(clean_name, error = %e, "failed to discard game without a source"),
    }
}
