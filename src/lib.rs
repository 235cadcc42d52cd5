//! Sitemap change monitor with cross-platform game identity resolution.
//!
//! Feeds are fetched, diffed against the previous snapshot for their domain,
//! and every new URL is classified. Game pages are merged into one identity
//! per normalized name and scored by how many domains host them.

pub mod classify;
pub mod cli;
pub mod config;
pub mod database_ops;
pub mod identity;
pub mod logging;
pub mod monitor;
pub mod normalization;
pub mod sitemap;

pub mod util {
    pub mod env;
}

pub use classify::{classify, Classification, Classifier};
pub use config::{CheckMode, MonitorConfig};
pub use identity::{platform_score, upsert_game, Resolution};
pub use normalization::normalize_name;
