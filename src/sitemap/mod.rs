//! Sitemap retrieval and incremental diffing.

pub mod diff;
pub mod extract;
pub mod fetch;

pub use diff::{diff_snapshots, SnapshotDiff};
pub use extract::extract_urls;
pub use fetch::{FetchError, HttpFetcher, SitemapFetcher, BROWSER_USER_AGENT};
