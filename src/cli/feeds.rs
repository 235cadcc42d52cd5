use anyhow::{bail, Result};

use crate::classify::Classifier;
use crate::config::MonitorConfig;
use crate::database_ops::SitemapStore;
use crate::monitor;

#[derive(Debug, Clone)]
pub enum FeedAction {
    List,
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone)]
pub struct FeedsConfig {
    pub database_url: Option<String>,
    pub action: FeedAction,
    pub json: bool,
}

pub async fn run(cfg: FeedsConfig) -> Result<()> {
    let monitor_cfg = MonitorConfig::from_env()?;
    let store = super::connect_store(cfg.database_url.clone(), &monitor_cfg).await?;

    match cfg.action {
        FeedAction::List => {
            let feeds = store.list_feeds().await?;
            if cfg.json {
                return super::print_json(&feeds);
            }
            if feeds.is_empty() {
                println!("no feeds");
            }
            for f in feeds {
                println!("{}\t{}\t{}", f.domain, f.url, f.updated_at.format("%Y-%m-%d %H:%M"));
            }
        }
        FeedAction::Add(url) => {
            let fetcher = super::http_fetcher(&monitor_cfg)?;
            let outcome =
                monitor::add_feed(&store, &fetcher, &Classifier::default(), &url).await?;
            if cfg.json {
                return super::print_json(&outcome);
            }
            if outcome.is_first_check {
                println!("added {} ({} urls, baseline recorded)", outcome.url, outcome.url_count);
            } else {
                println!(
                    "refreshed {} ({} urls, {} new, {} discoveries)",
                    outcome.url,
                    outcome.url_count,
                    outcome.new_urls.len(),
                    outcome.discoveries.len()
                );
            }
        }
        FeedAction::Remove(url) => {
            if !monitor::remove_feed(&store, &url).await? {
                bail!("feed not found: {url}");
            }
            println!("removed {url}");
        }
    }
    Ok(())
}
