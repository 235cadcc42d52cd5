use anyhow::Result;
use std::time::Duration;

use crate::classify::Classifier;
use crate::config::{feed_timeout_secs, CheckMode, MonitorConfig};
use crate::monitor::{run_scheduled, BatchReport};

#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    pub mode: Option<CheckMode>,
    pub delay_ms: Option<u64>,
    pub group_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_feeds: Option<usize>,
    /// Print the report as JSON instead of text.
    pub json: bool,
}

impl CheckConfig {
    /// Layer the flags over the environment config.
    pub fn apply(&self, base: &mut MonitorConfig) {
        if let Some(mode) = self.mode {
            base.mode = mode;
        }
        if let Some(ms) = self.delay_ms {
            base.delay = Duration::from_millis(ms);
        }
        if let Some(n) = self.group_size {
            base.group_size = n.max(1);
        }
        if let Some(secs) = self.timeout_secs {
            base.feed_timeout = feed_timeout_secs(secs);
        }
        if self.max_feeds.is_some() {
            base.max_feeds = self.max_feeds;
        }
    }
}

pub async fn run(cfg: CheckConfig) -> Result<BatchReport> {
    let mut monitor = MonitorConfig::from_env()?;
    cfg.apply(&mut monitor);

    let store = super::connect_store(cfg.database_url.clone(), &monitor).await?;
    let fetcher = super::http_fetcher(&monitor)?;
    let classifier = Classifier::default();

    let report = run_scheduled(&store, &fetcher, &classifier, &monitor).await?;
    if cfg.json {
        super::print_json(&report)?;
    } else {
        print!("{}", render_report(&report));
    }
    Ok(report)
}

pub fn render_report(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "checked {}/{} feeds ({} ok, {} failed, {} timed out, {} skipped) in {:.1}s\n",
        report.processed,
        report.total,
        report.succeeded,
        report.failed,
        report.timed_out,
        report.skipped,
        report.duration.as_secs_f64()
    ));
    if report.new_url_count == 0 {
        out.push_str("no new urls\n");
    } else {
        out.push_str(&format!("{} new urls\n", report.new_url_count));
        for (domain, summary) in &report.domains {
            out.push_str(&format!(
                "  {domain}: +{} urls, {} discoveries\n",
                summary.new_urls, summary.discoveries
            ));
        }
    }
    for d in &report.discoveries {
        let tag = if d.is_new { "new" } else { "cross-platform" };
        out.push_str(&format!(
            "  [{tag}] {} ({}) platforms={} score={:.1} {}\n",
            d.name, d.clean_name, d.platform_count, d.score, d.url
        ));
    }
    for f in &report.failures {
        out.push_str(&format!("  ! {}: {}\n", f.url, f.error));
    }
    out
}
