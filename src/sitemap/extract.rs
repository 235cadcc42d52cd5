use regex::Regex;
use std::sync::OnceLock;

static LOC_RE: OnceLock<Regex> = OnceLock::new();

fn loc_regex() -> &'static Regex {
    LOC_RE.get_or_init(|| {
        Regex::new(r"(?i)<loc>\s*(https?://[^<\s]+)\s*</loc>")
            .expect("static <loc> pattern compiles")
    })
}

/// Pull every `<loc>` URL out of a `urlset` or `sitemapindex` body, in document order.
///
/// Duplicates are kept. Anything that is not sitemap XML simply yields no URLs.
pub fn extract_urls(xml: &str) -> Vec<String> {
    loc_regex()
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}
