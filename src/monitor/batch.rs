use anyhow::{Context, Result};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use super::check::{check_feed, Discovery, FeedOutcome};
use crate::classify::Classifier;
use crate::config::{CheckMode, MonitorConfig};
use crate::database_ops::store::SitemapStore;
use crate::sitemap::SitemapFetcher;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainSummary {
    pub new_urls: usize,
    pub discoveries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedFailure {
    pub url: String,
    pub error: String,
    pub timed_out: bool,
}

/// Totals for one pass over the feed list.
///
/// `succeeded + failed == processed`; a timed-out feed counts as failed too.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub mode: CheckMode,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Feeds left out by the per-run cap.
    pub skipped: usize,
    pub new_url_count: usize,
    pub url_errors: usize,
    /// Domains with at least one new URL, in check order.
    pub domains: IndexMap<String, DomainSummary>,
    pub discoveries: Vec<Discovery>,
    pub failures: Vec<FeedFailure>,
    pub logs_cleaned: u64,
    #[serde(rename = "duration_ms", serialize_with = "millis")]
    pub duration: Duration,
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

enum FeedResult {
    Done(FeedOutcome),
    Failed(anyhow::Error),
    TimedOut(Duration),
}

impl BatchReport {
    fn record(&mut self, url: &str, result: FeedResult) {
        self.processed += 1;
        match result {
            FeedResult::Done(outcome) => {
                self.succeeded += 1;
                self.url_errors += outcome.url_errors;
                if !outcome.new_urls.is_empty() {
                    self.new_url_count += outcome.new_urls.len();
                    let entry = self.domains.entry(outcome.domain.clone()).or_default();
                    entry.new_urls += outcome.new_urls.len();
                    entry.discoveries += outcome.discoveries.len();
                }
                self.discoveries.extend(outcome.discoveries);
            }
            FeedResult::Failed(e) => {
                warn!(url, error = %format!("{e:#}"), "feed check failed");
                self.failed += 1;
                self.failures.push(FeedFailure {
                    url: url.to_string(),
                    error: format!("{e:#}"),
                    timed_out: false,
                });
            }
            FeedResult::TimedOut(limit) => {
                warn!(url, timeout_secs = limit.as_secs_f64(), "feed check timed out");
                self.failed += 1;
                self.timed_out += 1;
                self.failures.push(FeedFailure {
                    url: url.to_string(),
                    error: format!("timed out after {}s", limit.as_secs_f64()),
                    timed_out: true,
                });
            }
        }
    }

    pub fn new_games(&self) -> usize {
        self.discoveries.iter().filter(|d| d.is_new).count()
    }

    pub fn cross_platform(&self) -> usize {
        self.discoveries.iter().filter(|d| d.is_cross_platform).count()
    }

    pub fn log_summary(&self) {
        info!(
            mode = %self.mode,
            total = self.total,
            processed = self.processed,
            succeeded = self.succeeded,
            failed = self.failed,
            timed_out = self.timed_out,
            skipped = self.skipped,
            new_urls = self.new_url_count,
            new_games = self.new_games(),
            cross_platform = self.cross_platform(),
            duration_ms = self.duration.as_millis() as u64,
            "batch finished"
        );
    }
}

async fn run_one<S, F>(
    store: &S,
    fetcher: &F,
    classifier: &Classifier,
    url: &str,
    limit: Option<Duration>,
) -> FeedResult
where
    S: SitemapStore + ?Sized,
    F: SitemapFetcher + ?Sized,
{
    let fut = check_feed(store, fetcher, classifier, url);
    let res = match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => return FeedResult::TimedOut(limit),
        },
        None => fut.await,
    };
    match res {
        Ok(outcome) => FeedResult::Done(outcome),
        Err(e) => FeedResult::Failed(e),
    }
}

/// Check every feed once. Failures are isolated per feed; the batch itself
/// never fails.
pub async fn run_batch<S, F>(
    store: &S,
    fetcher: &F,
    classifier: &Classifier,
    feeds: &[String],
    config: &MonitorConfig,
) -> BatchReport
where
    S: SitemapStore + ?Sized,
    F: SitemapFetcher + ?Sized,
{
    let started = Instant::now();
    let take = config
        .max_feeds
        .map_or(feeds.len(), |cap| cap.min(feeds.len()));
    let (to_check, _) = feeds.split_at(take);

    let mut report = BatchReport {
        mode: config.mode,
        total: feeds.len(),
        skipped: feeds.len() - take,
        ..BatchReport::default()
    };
    if report.skipped > 0 {
        warn!(skipped = report.skipped, cap = take, "feed cap reached; skipping the rest");
    }

    let limit = config.effective_timeout();
    info!(mode = %config.mode, feeds = to_check.len(), "starting batch");

    match config.mode {
        CheckMode::Sequential => {
            for (i, url) in to_check.iter().enumerate() {
                if i > 0 && !config.delay.is_zero() {
                    sleep(config.delay).await;
                }
                let result = run_one(store, fetcher, classifier, url, limit).await;
                report.record(url, result);
            }
        }
        CheckMode::Concurrent => {
            for group in to_check.chunks(config.group_size.max(1)) {
                let results = join_all(
                    group
                        .iter()
                        .map(|url| run_one(store, fetcher, classifier, url, limit)),
                )
                .await;
                for (url, result) in group.iter().zip(results) {
                    report.record(url, result);
                }
            }
        }
    }

    report.duration = started.elapsed();
    report
}

/// Load the feed list, run a batch, then prune old update logs.
pub async fn run_scheduled<S, F>(
    store: &S,
    fetcher: &F,
    classifier: &Classifier,
    config: &MonitorConfig,
) -> Result<BatchReport>
where
    S: SitemapStore + ?Sized,
    F: SitemapFetcher + ?Sized,
{
    let feeds = store.get_feeds().await.context("loading feeds")?;
    if feeds.is_empty() {
        info!("no feeds configured");
    }

    let mut report = run_batch(store, fetcher, classifier, &feeds, config).await;

    match store.clean_old_logs(config.log_retention_days).await {
        Ok(n) => {
            report.logs_cleaned = n;
            if n > 0 {
                info!(removed = n, days = config.log_retention_days, "pruned update logs");
            }
        }
        Err(e) => error!(error = %e, "failed to prune update logs"),
    }

    report.log_summary();
    Ok(report)
}
