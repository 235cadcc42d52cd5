//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Connection string keys in the order tried when direct connections are preferred.
const DIRECT_DB_KEYS: [&str; 4] = [
    "SUPABASE_DB_URL",
    "DATABASE_URL",
    "DB_URL",
    "SUPABASE_DB_SESSION_URL",
];
/// Default ordering: session pooler first.
const POOLED_DB_KEYS: [&str; 4] = [
    "SUPABASE_DB_SESSION_URL",
    "SUPABASE_DB_URL",
    "DATABASE_URL",
    "DB_URL",
];

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Common bootstrap for CLI binaries: load .env and report which database
/// key will be used, without logging its value.
pub fn bootstrap_cli(bin_name: &str) {
    init_env();

    let keys = if env_flag("PREFER_DIRECT_DB", false) {
        DIRECT_DB_KEYS
    } else {
        POOLED_DB_KEYS
    };
    match keys.iter().find(|k| env_opt(k).is_some()) {
        Some(key) => info!(target = "bootstrap", bin = bin_name, key, "database url configured"),
        None => warn!(
            target = "bootstrap",
            bin = bin_name,
            "no database url configured; only offline commands will work"
        ),
    }
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "on" | "yes")
}

/// Optional parsed value.
pub fn env_parse_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    init_env();
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// First configured database URL. Returns an error when none is set.
pub fn db_url() -> anyhow::Result<String> {
    init_env();
    let keys = if env_flag("PREFER_DIRECT_DB", false) {
        DIRECT_DB_KEYS
    } else {
        POOLED_DB_KEYS
    };
    keys.iter()
        .find_map(|k| env_opt(k))
        .ok_or_else(|| anyhow::anyhow!("no database URL env vars set ({})", keys.join(", ")))
}

/// Same as `db_url()` but swaps the Supabase transaction pooler for the
/// session pooler unless `DISABLE_SESSION_SWAP` is set.
pub fn db_url_prefer_session() -> anyhow::Result<String> {
    let raw = db_url()?;
    if env_flag("DISABLE_SESSION_SWAP", false) {
        Ok(raw)
    } else {
        Ok(prefer_session_mode(&raw))
    }
}

/// If the URL looks like Supabase's transaction pooler (port 6543),
/// prefer the session pooler (5432) to avoid prepare/timeout issues.
pub fn prefer_session_mode(url: &str) -> String {
    if url.contains("pooler.supabase.com:6543") {
        warn!("detected Supabase transaction pooler (:6543); switching to :5432 (session)");
        url.replace("pooler.supabase.com:6543", "pooler.supabase.com:5432")
    } else {
        url.to_string()
    }
}

/// Mask credentials for logging. Secrets by key name, postgres DSNs by value.
pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD")
        || k.contains("SECRET")
        || k.contains("KEY")
        || k.contains("TOKEN")
        || k.contains("COOKIE")
    {
        return "***".to_string();
    }

    let val_trim = val.trim();

    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    if (k.contains("URL") || k.contains("DSN"))
        && (val_trim.starts_with("postgres://") || val_trim.starts_with("postgresql://"))
    {
        return "postgres://***".to_string();
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing required env: {:?}", missing));
    }
    Ok(())
}
