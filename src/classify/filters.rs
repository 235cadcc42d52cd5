//! Exclusion filters applied before and after slug extraction.

use url::Url;

/// Listing pages: any path segment equal to one of these marks a non-game URL.
const LISTING_SEGMENTS: &[&str] = &[
    "tag",
    "tags",
    "category",
    "categories",
    "author",
    "authors",
    "genre",
    "genres",
    "collection",
    "collections",
    "series",
    "topic",
    "topics",
    "search",
    "page",
    "user",
    "users",
    "developer",
    "developers",
];

const INFO_SEGMENTS: &[&str] = &[
    "about",
    "about-us",
    "contact",
    "contact-us",
    "privacy",
    "privacy-policy",
    "terms",
    "terms-of-use",
    "terms-of-service",
    "tos",
    "faq",
    "help",
    "dmca",
    "cookies",
    "cookie-policy",
    "disclaimer",
    "imprint",
    "legal",
    "support",
    "careers",
    "jobs",
    "advertise",
    "press",
];

const EDITORIAL_SEGMENTS: &[&str] = &[
    "blog", "blogs", "news", "article", "articles", "post", "posts", "feed", "rss", "atom",
];

const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "avif", "css", "js", "json", "xml",
    "txt", "pdf", "zip", "gz", "rar", "7z", "mp3", "mp4", "webm", "ogg", "wav", "woff", "woff2",
    "ttf", "apk", "exe", "dmg",
];

/// Listing slugs that look like names but are category/navigation pages.
/// Compared case-insensitively against the whole raw name.
pub const CATEGORY_BLOCKLIST: &[&str] = &[
    "games",
    "game",
    "all-games",
    "new-games",
    "hot-games",
    "top-games",
    "best-games",
    "popular-games",
    "free-games",
    "online-games",
    "trending-games",
    "action-games",
    "adventure-games",
    "arcade-games",
    "puzzle-games",
    "racing-games",
    "shooting-games",
    "sports-games",
    "strategy-games",
    "multiplayer-games",
    "io-games",
    "2-player-games",
    "action",
    "adventure",
    "arcade",
    "puzzle",
    "racing",
    "shooting",
    "sports",
    "strategy",
    "multiplayer",
    "casual",
    "kids",
    "girls",
    "boys",
    "io",
    "2-player",
    "new",
    "hot",
    "popular",
    "trending",
    "top-rated",
    "most-played",
    "recently-played",
    "updated",
    "upcoming",
    "random",
    "favorites",
    "home",
    "index",
    "login",
    "log-in",
    "signin",
    "sign-in",
    "logout",
    "register",
    "signup",
    "sign-up",
    "account",
    "profile",
    "settings",
    "play",
];

/// Real titles that happen to end in `-game`/`-games`. Closed list: anything
/// else with that suffix is treated as a category page.
pub const GAME_SUFFIX_ALLOWLIST: &[&str] = &[
    "hunger-games",
    "the-hunger-games",
    "squid-game",
    "the-squid-game",
    "mind-games",
    "war-games",
    "the-game",
    "olympic-games",
    "the-impossible-game",
    "the-floor-is-lava-game",
];

/// Stage-one filter: `true` when the URL path is clearly not a single game page.
pub fn is_excluded(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let Some(last) = segments.last() else {
        // bare domain root
        return true;
    };

    if segments.len() == 1 && is_language_code(last) {
        return true;
    }

    if segments.iter().any(|s| {
        LISTING_SEGMENTS.contains(s) || INFO_SEGMENTS.contains(s) || EDITORIAL_SEGMENTS.contains(s)
    }) {
        return true;
    }

    if last.starts_with("sitemap") || *last == "robots.txt" {
        return true;
    }

    if let Some((_, ext)) = last.rsplit_once('.') {
        if NON_DOCUMENT_EXTENSIONS.contains(&ext) {
            return true;
        }
    }

    false
}

/// Two-letter language roots such as `/en/` or `/de`.
fn is_language_code(segment: &str) -> bool {
    segment.len() == 2 && segment.chars().all(|c| c.is_ascii_alphabetic())
}

/// Post-extraction name checks. `true` means the raw name must be dropped.
pub fn rejects_name(raw: &str) -> bool {
    let len = raw.chars().count();
    if !(2..=100).contains(&len) {
        return true;
    }

    let lowered = raw.to_lowercase();
    if CATEGORY_BLOCKLIST.contains(&lowered.as_str()) {
        return true;
    }

    let has_game_suffix = lowered.ends_with("-game") || lowered.ends_with("-games");
    has_game_suffix && !GAME_SUFFIX_ALLOWLIST.contains(&lowered.as_str())
}
