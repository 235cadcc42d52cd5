//! Command implementations behind the `smon` binary.

pub mod check;
pub mod feeds;
pub mod games;
pub mod maintenance;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{MonitorConfig, ENV_KEYS};
use crate::database_ops::{Db, PgStore};
use crate::sitemap::HttpFetcher;
use crate::util::env;

/// Explicit `--db-url` wins over the environment.
pub fn resolve_database_url(db_url: Option<String>) -> Result<String> {
    if let Some(url) = db_url {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let env_url =
        env::db_url_prefer_session().context("resolve_database_url: missing database URL")?;
    let trimmed = env_url.trim();
    if trimmed.is_empty() {
        bail!("database URL is empty; set SUPABASE_DB_URL / DATABASE_URL or pass --db-url");
    }
    Ok(trimmed.to_string())
}

pub async fn connect_store(db_url: Option<String>, cfg: &MonitorConfig) -> Result<PgStore> {
    env::preflight_check("smon", &[], ENV_KEYS)?;
    let database_url = resolve_database_url(db_url)?;
    info!(url = %env::redact_value("DATABASE_URL", &database_url), "connecting");
    let db = Db::connect(&database_url, cfg.db_max_conns, cfg.auto_migrate).await?;
    Ok(PgStore::new(db))
}

pub fn http_fetcher(cfg: &MonitorConfig) -> Result<HttpFetcher> {
    HttpFetcher::new(&cfg.user_agent, cfg.http_timeout).context("building http client")
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
