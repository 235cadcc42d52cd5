use anyhow::Result;
use tracing::info;

use crate::config::MonitorConfig;
use crate::database_ops::SitemapStore;

pub async fn run_migrate(database_url: Option<String>) -> Result<()> {
    let mut cfg = MonitorConfig::from_env()?;
    // Migrations run below, not in the connect hook.
    cfg.auto_migrate = false;
    let store = super::connect_store(database_url, &cfg).await?;
    store.db().run_migrations().await?;
    println!("migrations up-to-date");
    Ok(())
}

pub async fn run_clean_logs(database_url: Option<String>, days: Option<u32>) -> Result<u64> {
    let cfg = MonitorConfig::from_env()?;
    let days = days.unwrap_or(cfg.log_retention_days);
    let store = super::connect_store(database_url, &cfg).await?;
    let removed = store.clean_old_logs(days).await?;
    info!(removed, days, "clean-logs: completed");
    println!("removed {removed} update log rows older than {days} days");
    Ok(removed)
}
