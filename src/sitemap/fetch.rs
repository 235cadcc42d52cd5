//! HTTP retrieval of sitemap bodies with transparent gzip handling.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Browser-like identification; several game portals reject obvious bot agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors that can occur while retrieving a sitemap
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decompress gzip sitemap: {0}")]
    Decode(#[source] std::io::Error),
    #[error("invalid sitemap URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// HTTP status carried by a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Source of raw sitemap text. No retries: callers own backoff policy.
#[async_trait]
pub trait SitemapFetcher: Send + Sync {
    async fn fetch_sitemap(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SitemapFetcher for HttpFetcher {
    async fn fetch_sitemap(&self, url: &str) -> Result<String, FetchError> {
        let parsed =
            url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let resp = self.client.get(parsed.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let gzip = looks_gzipped(
            &parsed,
            header(CONTENT_ENCODING).as_deref(),
            header(CONTENT_TYPE).as_deref(),
        );

        let bytes = resp.bytes().await?;
        debug!(url, bytes = bytes.len(), gzip, "sitemap downloaded");
        decode_body(&bytes, gzip)
    }
}

/// Gzip is signalled by a `.gz` path suffix or by transport headers.
pub fn looks_gzipped(
    url: &url::Url,
    content_encoding: Option<&str>,
    content_type: Option<&str>,
) -> bool {
    let by_extension = url.path().to_ascii_lowercase().ends_with(".gz");
    let by_encoding = content_encoding.is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
    let by_type = content_type.is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
    by_extension || by_encoding || by_type
}

/// Turn a response body into UTF-8 text, gunzipping when flagged.
///
/// A flagged body without the gzip magic header is returned as-is: some CDNs
/// serve `.gz` paths already inflated.
pub fn decode_body(bytes: &[u8], gzip: bool) -> Result<String, FetchError> {
    if gzip && bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::with_capacity(bytes.len() * 4);
        MultiGzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(FetchError::Decode)?;
        return Ok(String::from_utf8_lossy(&out).into_owned());
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gz(text: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn detects_gzip_by_extension_or_headers() {
        let gz_url = url::Url::parse("https://s.com/sitemap.xml.gz").unwrap();
        let plain = url::Url::parse("https://s.com/sitemap.xml").unwrap();
        assert!(looks_gzipped(&gz_url, None, None));
        assert!(looks_gzipped(&plain, Some("gzip"), None));
        assert!(looks_gzipped(&plain, None, Some("application/x-gzip")));
        assert!(!looks_gzipped(&plain, None, Some("application/xml")));
    }

    #[test]
    fn query_string_does_not_hide_extension() {
        let u = url::Url::parse("https://s.com/sitemap.xml.GZ?v=2").unwrap();
        assert!(looks_gzipped(&u, None, None));
    }

    #[test]
    fn inflates_gzip_bodies() {
        let body = gz("<urlset><url><loc>https://s.com/g/a</loc></url></urlset>");
        let text = decode_body(&body, true).unwrap();
        assert!(text.contains("https://s.com/g/a"));
    }

    #[test]
    fn passes_plain_bodies_through() {
        let text = decode_body(b"<urlset/>", false).unwrap();
        assert_eq!(text, "<urlset/>");
        let text = decode_body(b"<urlset/>", true).unwrap();
        assert_eq!(text, "<urlset/>");
    }

    #[test]
    fn corrupt_gzip_is_a_decode_error() {
        // Valid gzip header followed by a deflate block with a reserved block type.
        let body = [
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff,
        ];
        let err = decode_body(&body, true).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
