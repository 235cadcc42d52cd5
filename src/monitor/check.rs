use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classify::Classifier;
use crate::database_ops::store::SitemapStore;
use crate::identity::{upsert_game, Resolution};
use crate::sitemap::{diff_snapshots, SitemapFetcher};

/// A classified URL that produced a new game or a new platform.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub url: String,
    pub domain: String,
    pub name: String,
    pub clean_name: String,
    pub is_new: bool,
    pub is_cross_platform: bool,
    pub platform_count: i32,
    pub score: f64,
}

impl Discovery {
    fn from_resolution(url: &str, domain: &str, res: &Resolution) -> Self {
        Self {
            url: url.to_string(),
            domain: domain.to_string(),
            name: res.game.name.clone(),
            clean_name: res.game.clean_name.clone(),
            is_new: res.is_new,
            is_cross_platform: res.is_cross_platform,
            platform_count: res.game.platform_count,
            score: res.game.score,
        }
    }
}

/// Result of checking one feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedOutcome {
    pub url: String,
    pub domain: String,
    pub is_first_check: bool,
    /// Locations in the fetched snapshot, duplicates included.
    pub url_count: usize,
    pub new_urls: Vec<String>,
    pub discoveries: Vec<Discovery>,
    /// New URLs the classifier skipped.
    pub skipped_urls: usize,
    /// New URLs whose upsert failed. The rest of the feed still ran.
    pub url_errors: usize,
}

/// Hostname of an absolute http(s) URL; also the snapshot and source key.
pub fn feed_domain(feed_url: &str) -> Result<String> {
    let url = Url::parse(feed_url).with_context(|| format!("invalid feed url {feed_url:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("feed url must be http or https: {feed_url}");
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => bail!("feed url has no host: {feed_url}"),
    }
}

/// Fetch, diff, persist and resolve one feed.
///
/// Fetch and snapshot failures abort the feed. Per-URL identity failures are
/// counted and skipped.
#[instrument(skip(store, fetcher, classifier), fields(domain = tracing::field::Empty))]
pub async fn check_feed<S, F>(
    store: &S,
    fetcher: &F,
    classifier: &Classifier,
    feed_url: &str,
) -> Result<FeedOutcome>
where
    S: SitemapStore + ?Sized,
    F: SitemapFetcher + ?Sized,
{
    let domain = feed_domain(feed_url)?;
    tracing::Span::current().record("domain", domain.as_str());

    let body = fetcher
        .fetch_sitemap(feed_url)
        .await
        .with_context(|| format!("fetching {feed_url}"))?;

    let previous = store
        .get_snapshot(&domain)
        .await
        .context("loading previous snapshot")?
        .filter(|content| !content.is_empty());

    let diff = diff_snapshots(previous.as_deref(), &body);
    store
        .save_snapshot(&domain, &body, diff.url_count)
        .await
        .context("saving snapshot")?;

    if diff.is_first_check {
        info!(domain = %domain, urls = diff.url_count, "baseline snapshot recorded");
    }

    if !diff.added_urls.is_empty() {
        if let Err(e) = store.log_batch(&domain, &diff.added_urls).await {
            warn!(domain = %domain, error = %e, "failed to record update log");
        }
    }

    let mut outcome = FeedOutcome {
        url: feed_url.to_string(),
        domain: domain.clone(),
        is_first_check: diff.is_first_check,
        url_count: diff.url_count,
        new_urls: Vec::with_capacity(diff.added_urls.len()),
        discoveries: Vec::new(),
        skipped_urls: 0,
        url_errors: 0,
    };

    for url in diff.added_urls {
        match classifier.classify(&url) {
            None => {
                debug!(url = %url, "not a game page");
                outcome.skipped_urls += 1;
            }
            Some(c) => match upsert_game(store, &c.name, &c.clean_name, &domain, &url).await {
                Ok(res) if res.is_discovery() => {
                    outcome
                        .discoveries
                        .push(Discovery::from_resolution(&url, &domain, &res));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %url, clean_name = %c.clean_name, error = %e, "game upsert failed");
                    outcome.url_errors += 1;
                }
            },
        }
        outcome.new_urls.push(url);
    }

    if !outcome.new_urls.is_empty() {
        info!(
            domain = %domain,
            new_urls = outcome.new_urls.len(),
            discoveries = outcome.discoveries.len(),
            skipped = outcome.skipped_urls,
            errors = outcome.url_errors,
            "feed changed"
        );
    }
    Ok(outcome)
}

/// Validate, check once, then register the feed. A feed that cannot be
/// fetched is not stored.
pub async fn add_feed<S, F>(
    store: &S,
    fetcher: &F,
    classifier: &Classifier,
    feed_url: &str,
) -> Result<FeedOutcome>
where
    S: SitemapStore + ?Sized,
    F: SitemapFetcher + ?Sized,
{
    let feed_url = feed_url.trim();
    let domain = feed_domain(feed_url)?;
    if !feed_url.to_ascii_lowercase().contains("sitemap") {
        bail!("not a sitemap url (expected \"sitemap\" in the url): {feed_url}");
    }

    let outcome = check_feed(store, fetcher, classifier, feed_url).await?;
    store
        .upsert_feed(feed_url, &domain)
        .await
        .context("registering feed")?;
    info!(url = %feed_url, domain = %domain, urls = outcome.url_count, "feed registered");
    Ok(outcome)
}

/// Stop monitoring a feed. Catalogue history is kept.
pub async fn remove_feed<S>(store: &S, feed_url: &str) -> Result<bool>
where
    S: SitemapStore + ?Sized,
{
    let removed = store
        .remove_feed(feed_url.trim())
        .await
        .context("removing feed")?;
    if removed {
        info!(url = %feed_url, "feed removed");
    } else {
        warn!(url = %feed_url, "feed not found");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_the_hostname() {
        assert_eq!(feed_domain("https://Poki.com/en/sitemap.xml").unwrap(), "poki.com");
        assert_eq!(
            feed_domain("https://www.crazygames.com/sitemap/games.xml").unwrap(),
            "www.crazygames.com"
        );
        assert!(feed_domain("ftp://host/sitemap.xml").is_err());
        assert!(feed_domain("not a url").is_err());
    }
}
