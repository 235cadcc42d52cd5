use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use site_monitor::classify::Classifier;
use site_monitor::config::{CheckMode, MonitorConfig};
use site_monitor::database_ops::models::{
    CatalogueStats, Feed, Game, GameFilter, GameInsert, GameWithSources, SourceInsert,
};
use site_monitor::database_ops::{MemoryStore, SitemapStore};
use site_monitor::monitor::{add_feed, check_feed, remove_feed, run_batch, run_scheduled};
use site_monitor::sitemap::{FetchError, SitemapFetcher};

const POKI: &str = "https://poki.com/en/sitemap.xml";
const CRAZY: &str = "https://www.crazygames.com/sitemap/games.xml";
const BROKEN: &str = "https://broken.test/sitemap.xml";
const SLOW: &str = "https://slow.test/sitemap.xml";

fn urlset(locs: &[&str]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<urlset>\n");
    for loc in locs {
        out.push_str(&format!("  <url>\n    <loc>\n      {loc}\n    </loc>\n  </url>\n"));
    }
    out.push_str("</urlset>\n");
    out
}

/// Serves canned bodies; unknown URLs answer 404, `slow.test` never answers in time.
#[derive(Default)]
struct StubFetcher {
    bodies: Mutex<HashMap<String, String>>,
}

impl StubFetcher {
    fn set(&self, url: &str, locs: &[&str]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), urlset(locs));
    }
}

#[async_trait]
impl SitemapFetcher for StubFetcher {
    async fn fetch_sitemap(&self, url: &str) -> Result<String, FetchError> {
        if url.contains("slow.test") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let body = self.bodies.lock().unwrap().get(url).cloned();
        body.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Memory store that refuses to attach sources whose URL contains `poison`.
struct RejectingStore {
    inner: MemoryStore,
    poison: &'static str,
}

#[async_trait]
impl SitemapStore for RejectingStore {
    async fn get_feeds(&self) -> anyhow::Result<Vec<String>> {
        self.inner.get_feeds().await
    }
    async fn list_feeds(&self) -> anyhow::Result<Vec<Feed>> {
        self.inner.list_feeds().await
    }
    async fn upsert_feed(&self, url: &str, domain: &str) -> anyhow::Result<()> {
        self.inner.upsert_feed(url, domain).await
    }
    async fn remove_feed(&self, url: &str) -> anyhow::Result<bool> {
        self.inner.remove_feed(url).await
    }
    async fn get_snapshot(&self, domain: &str) -> anyhow::Result<Option<String>> {
        self.inner.get_snapshot(domain).await
    }
    async fn save_snapshot(&self, domain: &str, content: &str, n: usize) -> anyhow::Result<()> {
        self.inner.save_snapshot(domain, content, n).await
    }
    async fn find_game_by_clean_name(&self, clean_name: &str) -> anyhow::Result<Option<Game>> {
        self.inner.find_game_by_clean_name(clean_name).await
    }
    async fn create_game(&self, name: &str, clean_name: &str) -> anyhow::Result<GameInsert> {
        self.inner.create_game(name, clean_name).await
    }
    async fn source_exists(&self, game_id: i64, domain: &str) -> anyhow::Result<bool> {
        self.inner.source_exists(game_id, domain).await
    }
    async fn add_source(
        &self,
        game_id: i64,
        domain: &str,
        url: &str,
    ) -> anyhow::Result<SourceInsert> {
        if url.contains(self.poison) {
            return Err(anyhow!("connection reset while inserting source"));
        }
        self.inner.add_source(game_id, domain, url).await
    }
    async fn update_platform_stats(&self, game_id: i64) -> anyhow::Result<Game> {
        self.inner.update_platform_stats(game_id).await
    }
    async fn count_platforms(&self, game_id: i64) -> anyhow::Result<i32> {
        self.inner.count_platforms(game_id).await
    }
    async fn delete_unsourced_game(&self, game_id: i64) -> anyhow::Result<bool> {
        self.inner.delete_unsourced_game(game_id).await
    }
    async fn log_batch(&self, domain: &str, urls: &[String]) -> anyhow::Result<()> {
        self.inner.log_batch(domain, urls).await
    }
    async fn clean_old_logs(&self, days: u32) -> anyhow::Result<u64> {
        self.inner.clean_old_logs(days).await
    }
    async fn stats(&self) -> anyhow::Result<CatalogueStats> {
        self.inner.stats().await
    }
    async fn list_games(&self, filter: &GameFilter) -> anyhow::Result<Vec<GameWithSources>> {
        self.inner.list_games(filter).await
    }
}

fn quick_config(mode: CheckMode) -> MonitorConfig {
    MonitorConfig {
        mode,
        delay: Duration::ZERO,
        group_size: 2,
        feed_timeout: Some(Duration::from_millis(200)),
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn first_check_records_baseline_without_additions() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(
        POKI,
        &[
            "https://poki.com/en/g/slope",
            "https://poki.com/en/g/bloxd-io",
            "https://poki.com/en/about",
        ],
    );

    let outcome = check_feed(&store, &fetcher, &classifier, POKI).await.unwrap();
    assert!(outcome.is_first_check);
    assert!(outcome.new_urls.is_empty());
    assert_eq!(outcome.url_count, 3);
    assert_eq!(store.snapshot_url_count("poki.com"), Some(3));
    assert!(store.log_entries().is_empty());
    assert_eq!(store.stats().await.unwrap().total_games, 0);
}

#[tokio::test]
async fn second_check_reports_only_new_urls_in_order() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();

    fetcher.set(POKI, &["https://poki.com/en/g/slope", "https://poki.com/en/g/bloxd-io"]);
    check_feed(&store, &fetcher, &classifier, POKI).await.unwrap();

    fetcher.set(
        POKI,
        &[
            "https://poki.com/en/g/slope",
            "https://poki.com/en/g/moto-x3m",
            "https://poki.com/en/g/bloxd-io",
            "https://poki.com/en/category/action",
            "https://poki.com/en/g/subway-surfers",
        ],
    );
    let outcome = check_feed(&store, &fetcher, &classifier, POKI).await.unwrap();
    assert!(!outcome.is_first_check);
    assert_eq!(
        outcome.new_urls,
        vec![
            "https://poki.com/en/g/moto-x3m",
            "https://poki.com/en/category/action",
            "https://poki.com/en/g/subway-surfers",
        ]
    );
    assert_eq!(outcome.skipped_urls, 1);
    assert_eq!(outcome.discoveries.len(), 2);
    assert!(outcome.discoveries.iter().all(|d| d.is_new && d.platform_count == 1));

    let logs = store.log_entries();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].domain, "poki.com");
    assert_eq!(logs[0].count, 3);
    assert_eq!(store.snapshot_url_count("poki.com"), Some(5));

    // Unchanged sitemap: nothing new, no extra audit row.
    let again = check_feed(&store, &fetcher, &classifier, POKI).await.unwrap();
    assert!(again.new_urls.is_empty());
    assert_eq!(store.log_entries().len(), 1);
}

#[tokio::test]
async fn same_game_on_two_domains_becomes_cross_platform() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &[]);
    fetcher.set(CRAZY, &[]);
    let feeds = vec![POKI.to_string(), CRAZY.to_string()];
    let cfg = quick_config(CheckMode::Sequential);

    let baseline = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;
    assert_eq!(baseline.succeeded, 2);
    assert_eq!(baseline.new_url_count, 0);

    fetcher.set(POKI, &["https://poki.com/en/g/subway-surfers"]);
    fetcher.set(CRAZY, &["https://www.crazygames.com/game/subway-surfers"]);
    let report = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;

    assert_eq!(report.new_url_count, 2);
    assert_eq!(report.new_games(), 1);
    assert_eq!(report.cross_platform(), 1);
    assert_eq!(
        report.domains.keys().collect::<Vec<_>>(),
        vec!["poki.com", "www.crazygames.com"]
    );

    let cross = report.discoveries.iter().find(|d| d.is_cross_platform).unwrap();
    assert_eq!(cross.clean_name, "subway-surfers");
    assert_eq!(cross.platform_count, 2);
    assert_eq!(cross.score, 1.5);

    let games = store
        .list_games(&GameFilter {
            min_platforms: Some(2),
            ..GameFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].sources.len(), 2);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.cross_platform_games, 1);
}

#[tokio::test]
async fn failing_feed_does_not_poison_the_batch() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &["https://poki.com/en/g/slope"]);
    let feeds = vec![BROKEN.to_string(), POKI.to_string()];

    let cfg = quick_config(CheckMode::Sequential);
    let report = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;
    assert_eq!(report.total, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 0);
    assert_eq!(report.failures[0].url, BROKEN);
    assert!(report.failures[0].error.contains("404"));
    assert!(store.get_snapshot("broken.test").await.unwrap().is_none());
    assert!(store.get_snapshot("poki.com").await.unwrap().is_some());
}

#[tokio::test]
async fn upsert_failure_is_counted_and_the_feed_continues() {
    let store = RejectingStore {
        inner: MemoryStore::new(),
        poison: "moto-x3m",
    };
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    let feeds = vec![POKI.to_string()];
    let cfg = quick_config(CheckMode::Sequential);

    fetcher.set(POKI, &[]);
    run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;

    fetcher.set(
        POKI,
        &[
            "https://poki.com/en/g/slope",
            "https://poki.com/en/g/moto-x3m",
            "https://poki.com/en/g/subway-surfers",
        ],
    );
    let report = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.url_errors, 1);
    assert_eq!(report.new_url_count, 3);
    let names: Vec<&str> = report
        .discoveries
        .iter()
        .map(|d| d.clean_name.as_str())
        .collect();
    assert_eq!(names, vec!["slope", "subway-surfers"]);

    assert!(store
        .find_game_by_clean_name("moto-x3m")
        .await
        .unwrap()
        .is_none());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_games, 2);
    let games = store.list_games(&GameFilter::default()).await.unwrap();
    assert!(games
        .iter()
        .all(|g| g.game.platform_count as usize == g.sources.len()));
}

#[tokio::test]
async fn slow_feed_times_out_in_concurrent_mode() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &["https://poki.com/en/g/slope"]);
    fetcher.set(CRAZY, &["https://www.crazygames.com/game/slope"]);
    let feeds = vec![SLOW.to_string(), POKI.to_string(), CRAZY.to_string()];

    let cfg = quick_config(CheckMode::Concurrent);
    let report = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;
    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 1);
    assert!(report.failures[0].timed_out);
    assert!(report.duration < Duration::from_secs(10));
}

#[tokio::test]
async fn feed_cap_skips_the_tail() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &[]);
    fetcher.set(CRAZY, &[]);
    let feeds = vec![POKI.to_string(), CRAZY.to_string(), BROKEN.to_string()];
    let cfg = MonitorConfig {
        max_feeds: Some(2),
        ..quick_config(CheckMode::Sequential)
    };

    let report = run_batch(&store, &fetcher, &classifier, &feeds, &cfg).await;
    assert_eq!(report.total, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn add_feed_validates_checks_then_registers() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &["https://poki.com/en/g/slope"]);

    let err = add_feed(&store, &fetcher, &classifier, "https://poki.com/en/feed.xml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("sitemap"));

    assert!(add_feed(&store, &fetcher, &classifier, BROKEN).await.is_err());
    assert!(store.get_feeds().await.unwrap().is_empty());

    let outcome = add_feed(&store, &fetcher, &classifier, POKI).await.unwrap();
    assert!(outcome.is_first_check);
    let feeds = store.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].domain, "poki.com");

    // Re-adding refreshes rather than duplicating.
    add_feed(&store, &fetcher, &classifier, POKI).await.unwrap();
    assert_eq!(store.get_feeds().await.unwrap(), vec![POKI.to_string()]);

    assert!(remove_feed(&store, POKI).await.unwrap());
    assert!(!remove_feed(&store, POKI).await.unwrap());
    assert!(store.get_snapshot("poki.com").await.unwrap().is_some());
}

#[tokio::test]
async fn scheduled_run_prunes_old_logs() {
    let store = MemoryStore::new();
    let fetcher = StubFetcher::default();
    let classifier = Classifier::default();
    fetcher.set(POKI, &["https://poki.com/en/g/slope"]);
    store.upsert_feed(POKI, "poki.com").await.unwrap();

    run_scheduled(&store, &fetcher, &classifier, &quick_config(CheckMode::Sequential))
        .await
        .unwrap();
    fetcher.set(POKI, &["https://poki.com/en/g/slope", "https://poki.com/en/g/moto-x3m"]);
    run_scheduled(&store, &fetcher, &classifier, &quick_config(CheckMode::Sequential))
        .await
        .unwrap();
    assert_eq!(store.log_entries().len(), 1);

    store.age_logs(ChronoDuration::days(31));
    let report = run_scheduled(&store, &fetcher, &classifier, &quick_config(CheckMode::Sequential))
        .await
        .unwrap();
    assert_eq!(report.logs_cleaned, 1);
    assert!(store.log_entries().is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "sequential");
    assert_eq!(json["processed"], 1);
    assert!(json["duration_ms"].is_u64());
}
