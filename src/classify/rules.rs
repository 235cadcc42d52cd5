//! Hostname-keyed slug extractors plus the generic fallback chain.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Pulls a raw slug out of a URL already known to belong to the rule's host.
pub type SlugExtractor = fn(&Url) -> Option<String>;

#[derive(Clone)]
pub struct DomainRule {
    /// Registrable host; also matches any subdomain of it.
    pub host: &'static str,
    pub extract: SlugExtractor,
}

impl DomainRule {
    fn matches(&self, host: &str) -> bool {
        host == self.host
            || host
                .strip_suffix(self.host)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Open table of per-site extractors, consulted once per URL.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<DomainRule>,
}

impl RuleRegistry {
    /// Registry seeded with the portals we monitor out of the box.
    pub fn with_defaults() -> Self {
        Self::default()
            .register("poki.com", poki)
            .register("crazygames.com", crazygames)
            .register("y8.com", y8)
            .register("gamedistribution.com", gamedistribution)
            .register("gamepix.com", gamepix)
            .register("miniclip.com", miniclip)
            .register("kongregate.com", kongregate)
            .register("armorgames.com", armorgames)
            .register("coolmathgames.com", coolmathgames)
            .register("itch.io", itch)
            .register("playhop.com", playhop)
            .register("iogames.space", iogames_space)
    }

    /// Add or replace the extractor for `host`. Later registrations win.
    pub fn register(mut self, host: &'static str, extract: SlugExtractor) -> Self {
        self.rules.retain(|r| r.host != host);
        self.rules.push(DomainRule { host, extract });
        self
    }

    /// Most specific rule for `host` (longest registered host that matches).
    pub fn lookup(&self, host: &str) -> Option<&DomainRule> {
        self.rules
            .iter()
            .filter(|r| r.matches(host))
            .max_by_key(|r| r.host.len())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn segments(url: &Url) -> Vec<&str> {
    url.path().split('/').filter(|s| !s.is_empty()).collect()
}

/// Slug following the first segment equal to `marker`.
fn after_marker(url: &Url, marker: &str) -> Option<String> {
    let segs = segments(url);
    let pos = segs.iter().position(|s| s.eq_ignore_ascii_case(marker))?;
    segs.get(pos + 1).map(|s| s.to_string())
}

fn is_lang(segment: &str) -> bool {
    segment.len() == 2 && segment.chars().all(|c| c.is_ascii_alphabetic())
}

// poki.com/g/<slug>, poki.com/<lang>/g/<slug>
fn poki(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["g", slug] => Some(slug.to_string()),
        [lang, "g", slug] if is_lang(lang) => Some(slug.to_string()),
        _ => None,
    }
}

fn crazygames(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["game", slug] => Some(slug.to_string()),
        [lang, "game", slug] if is_lang(lang) => Some(slug.to_string()),
        _ => None,
    }
}

fn y8(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["games", slug] => Some(slug.to_string()),
        _ => None,
    }
}

fn gamedistribution(url: &Url) -> Option<String> {
    after_marker(url, "games")
}

fn gamepix(url: &Url) -> Option<String> {
    after_marker(url, "play")
}

// miniclip.com/games/<slug>/<lang>/
fn miniclip(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["games", slug, ..] => Some(slug.to_string()),
        _ => None,
    }
}

// kongregate.com/games/<developer>/<slug>, optionally language-prefixed
fn kongregate(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["games", _dev, slug] => Some(slug.to_string()),
        [lang, "games", _dev, slug] if is_lang(lang) => Some(slug.to_string()),
        _ => None,
    }
}

// armorgames.com/play/<id>/<slug> and armorgames.com/<slug>-game/<id>
fn armorgames(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        ["play", id, slug] if id.chars().all(|c| c.is_ascii_digit()) => Some(slug.to_string()),
        [slug_game, id] if id.chars().all(|c| c.is_ascii_digit()) => {
            slug_game.strip_suffix("-game").map(str::to_string)
        }
        _ => None,
    }
}

static NUMERIC_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

// coolmathgames.com/0-run-3: leading numeric id stripped
fn coolmathgames(url: &Url) -> Option<String> {
    let re = NUMERIC_PREFIX_RE
        .get_or_init(|| Regex::new(r"^\d+-(.+)$").expect("static numeric-prefix pattern compiles"));
    match segments(url).as_slice() {
        [seg] => re
            .captures(seg)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        _ => None,
    }
}

// <developer>.itch.io/<slug>
fn itch(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host == "itch.io" || host == "www.itch.io" {
        return None;
    }
    match segments(url).as_slice() {
        [slug] => Some(slug.to_string()),
        _ => None,
    }
}

// <slug>.playhop.com/<anything>: each game lives on its own subdomain
fn playhop(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let label = host.strip_suffix(".playhop.com")?;
    if label.is_empty() || label == "www" || label.contains('.') {
        return None;
    }
    Some(label.to_string())
}

fn iogames_space(url: &Url) -> Option<String> {
    match segments(url).as_slice() {
        [slug] => Some(slug.to_string()),
        _ => None,
    }
}

static GENERIC_RES: OnceLock<[Regex; 3]> = OnceLock::new();

fn generic_patterns() -> &'static [Regex; 3] {
    GENERIC_RES.get_or_init(|| {
        [
            Regex::new(r"(?i)/(?:games?|play|g)/([^/]+)/?$")
                .expect("static play-path pattern compiles"),
            Regex::new(r"(?i)/([^/]+)-game/?$").expect("static -game pattern compiles"),
            Regex::new(r"(?i)/([^/]+)\.html?$").expect("static .html pattern compiles"),
        ]
    })
}

/// Fallback chain for hosts without a registered rule:
/// `/game|games|play|g/<slug>`, `<slug>-game`, `<slug>.htm(l)`, then a lone path segment.
pub fn generic_slug(url: &Url) -> Option<String> {
    let path = url.path();
    for re in generic_patterns() {
        if let Some(m) = re.captures(path).and_then(|c| c.get(1)) {
            return Some(m.as_str().to_string());
        }
    }
    match segments(url).as_slice() {
        [seg] if !seg.contains('.') => Some(seg.to_string()),
        _ => None,
    }
}
