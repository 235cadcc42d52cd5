use std::collections::HashSet;

use super::extract::extract_urls;

/// Result of comparing a freshly fetched sitemap against the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// URLs present in the new body and absent from the old one, in new-body order.
    pub added_urls: Vec<String>,
    /// No prior snapshot existed, so nothing could be reported as added.
    pub is_first_check: bool,
    /// Number of `<loc>` entries in the new body (duplicates included).
    pub url_count: usize,
}

/// Diff `new_text` against the previous snapshot for the same domain.
///
/// Removed URLs are never reported. A URL duplicated inside the new body is
/// reported once per occurrence, matching the extractor's output.
pub fn diff_snapshots(old_text: Option<&str>, new_text: &str) -> SnapshotDiff {
    let new_urls = extract_urls(new_text);
    let url_count = new_urls.len();

    let Some(old_text) = old_text else {
        return SnapshotDiff {
            added_urls: Vec::new(),
            is_first_check: true,
            url_count,
        };
    };

    let old_urls: HashSet<String> = extract_urls(old_text).into_iter().collect();
    let added_urls = new_urls
        .into_iter()
        .filter(|u| !old_urls.contains(u))
        .collect();

    SnapshotDiff {
        added_urls,
        is_first_check: false,
        url_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urlset(urls: &[&str]) -> String {
        let mut xml = String::from("<urlset>");
        for u in urls {
            xml.push_str(&format!("<url><loc>{u}</loc></url>"));
        }
        xml.push_str("</urlset>");
        xml
    }

    #[test]
    fn first_check_reports_nothing() {
        let new = urlset(&["https://s/1", "https://s/2", "https://s/3"]);
        let d = diff_snapshots(None, &new);
        assert!(d.is_first_check);
        assert!(d.added_urls.is_empty());
        assert_eq!(d.url_count, 3);
    }

    #[test]
    fn reports_only_appended_urls() {
        let old = urlset(&["https://s/u1", "https://s/u2"]);
        let new = urlset(&["https://s/u1", "https://s/u2", "https://s/u3"]);
        let d = diff_snapshots(Some(&old), &new);
        assert!(!d.is_first_check);
        assert_eq!(d.added_urls, vec!["https://s/u3"]);
    }

    #[test]
    fn keeps_new_body_order_and_ignores_removals() {
        let old = urlset(&["https://s/a", "https://s/b"]);
        let new = urlset(&["https://s/z", "https://s/a", "https://s/y"]);
        let d = diff_snapshots(Some(&old), &new);
        assert_eq!(d.added_urls, vec!["https://s/z", "https://s/y"]);
    }

    #[test]
    fn empty_previous_snapshot_is_not_a_first_check() {
        let new = urlset(&["https://s/a"]);
        let d = diff_snapshots(Some(""), &new);
        assert!(!d.is_first_check);
        assert_eq!(d.added_urls, vec!["https://s/a"]);
    }

    #[test]
    fn identical_snapshots_have_no_additions() {
        let body = urlset(&["https://s/a", "https://s/b"]);
        let d = diff_snapshots(Some(&body), &body);
        assert!(d.added_urls.is_empty());
        assert_eq!(d.url_count, 2);
    }
}
