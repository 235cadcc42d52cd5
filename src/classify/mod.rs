//! URL → game-name classifier.
//!
//! Three ordered stages: path exclusion filters, a hostname-keyed extractor
//! (or the generic fallback chain for unknown hosts), then name checks. The
//! classifier is a best-effort heuristic and never fails; anything it cannot
//! make sense of is simply not a game.

pub mod filters;
pub mod rules;

use std::sync::OnceLock;

use serde::Serialize;
use url::Url;

use crate::normalization::normalize_name;
pub use rules::{generic_slug, DomainRule, RuleRegistry, SlugExtractor};

/// A URL recognised as an individual game page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Raw slug as it appeared in the URL (percent-decoded).
    pub name: String,
    /// Identity key derived from `name`.
    pub clean_name: String,
}

#[derive(Clone)]
pub struct Classifier {
    registry: RuleRegistry,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleRegistry::with_defaults())
    }
}

impl Classifier {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    /// `None` means "not a game page".
    pub fn classify(&self, url: &str) -> Option<Classification> {
        let parsed = Url::parse(url.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if filters::is_excluded(&parsed) {
            return None;
        }

        let host = parsed.host_str()?.to_ascii_lowercase();
        let raw = match self.registry.lookup(&host) {
            Some(rule) => (rule.extract)(&parsed),
            None => generic_slug(&parsed),
        }?;

        let name = decode_slug(&raw);
        if filters::rejects_name(&name) {
            return None;
        }

        let clean_name = normalize_name(&name);
        if clean_name.is_empty() {
            return None;
        }
        Some(Classification { name, clean_name })
    }
}

fn decode_slug(raw: &str) -> String {
    let bytes = urlencoding::decode_binary(raw.as_bytes());
    String::from_utf8_lossy(&bytes).trim().to_string()
}

static DEFAULT_CLASSIFIER: OnceLock<Classifier> = OnceLock::new();

/// Classify with the built-in rule table.
pub fn classify(url: &str) -> Option<Classification> {
    DEFAULT_CLASSIFIER.get_or_init(Classifier::default).classify(url)
}
