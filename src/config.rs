use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::sitemap::BROWSER_USER_AGENT;
use crate::util::env::{env_flag, env_opt, env_parse, env_parse_opt, init_env};

pub const DEFAULT_DELAY_MS: u64 = 200;
pub const DEFAULT_GROUP_SIZE: usize = 5;
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DB_MAX_CONNS: u32 = 5;

/// Environment keys read by [`MonitorConfig::from_env`].
pub const ENV_KEYS: &[&str] = &[
    "CHECK_MODE",
    "CHECK_DELAY_MS",
    "CHECK_GROUP_SIZE",
    "FEED_TIMEOUT_SECS",
    "MAX_FEEDS_PER_RUN",
    "LOG_RETENTION_DAYS",
    "HTTP_TIMEOUT_SECS",
    "SITEMAP_USER_AGENT",
    "DB_MAX_CONNS",
    "AUTO_MIGRATE",
];

/// Per-feed timeout from whole seconds; zero means no explicit timeout.
pub fn feed_timeout_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// How a batch walks its feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// One feed at a time with a fixed pause between requests.
    #[default]
    Sequential,
    /// Fixed-size groups checked together, each feed under a timeout.
    Concurrent,
}

impl FromStr for CheckMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "serial" => Ok(Self::Sequential),
            "concurrent" | "parallel" => Ok(Self::Concurrent),
            other => bail!("unknown check mode {other:?} (expected sequential or concurrent)"),
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        })
    }
}

/// Runtime settings for the monitor. CLI flags override fields after `from_env`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub mode: CheckMode,
    pub delay: Duration,
    pub group_size: usize,
    /// Explicit per-feed timeout. Concurrent mode falls back to the default.
    pub feed_timeout: Option<Duration>,
    pub max_feeds: Option<usize>,
    pub log_retention_days: u32,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub db_max_conns: u32,
    pub auto_migrate: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: CheckMode::Sequential,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            group_size: DEFAULT_GROUP_SIZE,
            feed_timeout: None,
            max_feeds: None,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: BROWSER_USER_AGENT.to_string(),
            db_max_conns: DEFAULT_DB_MAX_CONNS,
            auto_migrate: false,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        init_env();

        let mode = match env_opt("CHECK_MODE") {
            Some(raw) => raw.parse()?,
            None => CheckMode::default(),
        };

        Ok(Self {
            mode,
            delay: Duration::from_millis(env_parse("CHECK_DELAY_MS", DEFAULT_DELAY_MS)),
            group_size: env_parse("CHECK_GROUP_SIZE", DEFAULT_GROUP_SIZE).max(1),
            feed_timeout: env_parse_opt::<u64>("FEED_TIMEOUT_SECS").and_then(feed_timeout_secs),
            max_feeds: env_parse_opt("MAX_FEEDS_PER_RUN"),
            log_retention_days: env_parse("LOG_RETENTION_DAYS", DEFAULT_LOG_RETENTION_DAYS),
            http_timeout: Duration::from_secs(env_parse(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            user_agent: env_opt("SITEMAP_USER_AGENT")
                .unwrap_or_else(|| BROWSER_USER_AGENT.to_string()),
            db_max_conns: env_parse("DB_MAX_CONNS", DEFAULT_DB_MAX_CONNS).max(1),
            auto_migrate: env_flag("AUTO_MIGRATE", false),
        })
    }

    /// Timeout applied to each feed in a batch, if any.
    pub fn effective_timeout(&self) -> Option<Duration> {
        let explicit = self.feed_timeout.filter(|d| !d.is_zero());
        match self.mode {
            CheckMode::Concurrent => {
                Some(explicit.unwrap_or(Duration::from_secs(DEFAULT_FEED_TIMEOUT_SECS)))
            }
            CheckMode::Sequential => explicit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_loosely() {
        assert_eq!("Concurrent".parse::<CheckMode>().unwrap(), CheckMode::Concurrent);
        assert_eq!(" sequential ".parse::<CheckMode>().unwrap(), CheckMode::Sequential);
        assert!("fast".parse::<CheckMode>().is_err());
    }

    #[test]
    fn concurrent_mode_always_has_a_timeout() {
        let mut cfg = MonitorConfig {
            mode: CheckMode::Concurrent,
            ..MonitorConfig::default()
        };
        assert_eq!(cfg.effective_timeout(), Some(Duration::from_secs(8)));

        cfg.mode = CheckMode::Sequential;
        assert_eq!(cfg.effective_timeout(), None);

        cfg.feed_timeout = Some(Duration::from_secs(2));
        assert_eq!(cfg.effective_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.delay, Duration::from_millis(200));
        assert_eq!(cfg.group_size, 5);
        assert_eq!(cfg.log_retention_days, 30);
        assert_eq!(cfg.user_agent, BROWSER_USER_AGENT);
    }

    #[test]
    fn zero_timeout_means_unset() {
        assert_eq!(feed_timeout_secs(0), None);
        assert_eq!(feed_timeout_secs(5), Some(Duration::from_secs(5)));

        let mut cfg = MonitorConfig {
            mode: CheckMode::Concurrent,
            feed_timeout: Some(Duration::ZERO),
            ..MonitorConfig::default()
        };
        assert_eq!(cfg.effective_timeout(), Some(Duration::from_secs(8)));
        cfg.mode = CheckMode::Sequential;
        assert_eq!(cfg.effective_timeout(), None);
    }
}
