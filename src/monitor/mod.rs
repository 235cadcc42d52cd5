//! Feed checks and batch runs.

pub mod batch;
pub mod check;

pub use batch::{run_batch, run_scheduled, BatchReport, DomainSummary, FeedFailure};
pub use check::{add_feed, check_feed, feed_domain, remove_feed, Discovery, FeedOutcome};
