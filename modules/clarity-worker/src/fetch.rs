use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, warn};

use clarity_common::clamp_text;

use crate::traits::ArticleFetcher;

pub const NEWS_USER_AGENT: &str = "MCAI-SolaceNews/1.0 (+https://moralclarity.ai)";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

pub const INGEST_SNAPSHOT_MAX_CHARS: usize = 20_000;
const INGEST_TRUNCATION_MARKER: &str = "\n[...truncated for ingest...]";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").unwrap());
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<style.*?</style>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCK_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(p|div|br|h[1-6]|li)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_BEFORE_NL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\n").unwrap());
static SPACE_AFTER_NL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s+").unwrap());
static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static ANY_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// The regex crate has no backreferences, so script and style are separate.
static SCRIPT_OR_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>").unwrap()
});

/// HTML to readable text, keeping paragraph breaks as newlines.
pub fn strip_html_to_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = COMMENT_RE.replace_all(&text, " ");
    let text = BLOCK_CLOSE_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, " ");
    let text = SPACE_BEFORE_NL_RE.replace_all(&text, "\n");
    let text = SPACE_AFTER_NL_RE.replace_all(&text, "\n");
    let text = MULTI_SPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// HTML to a single line of text. Used for ingest snapshots.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_OR_STYLE_RE.replace_all(html, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = ANY_SPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Whether a rendered response is a full HTML document rather than text.
pub fn looks_like_html(body: &str) -> bool {
    let body = body.trim_start();
    body.starts_with("<!DOCTYPE") || body.starts_with("<html")
}

// ---------------------------------------------------------------------------
// HttpArticleFetcher
// ---------------------------------------------------------------------------

/// Plain GET with a news-bot user agent. Redirects are followed.
pub struct HttpArticleFetcher {
    client: reqwest::Client,
}

impl HttpArticleFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(NEWS_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpArticleFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching article");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {}", status.as_u16());
        }
        Ok(resp.text().await?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// SnapshotFetcher
// ---------------------------------------------------------------------------

/// Article snapshots for ingest: a rendering fetcher when configured, with a
/// direct fetch as fallback. Snapshots are plain text capped at
/// [`INGEST_SNAPSHOT_MAX_CHARS`].
#[derive(Clone)]
pub struct SnapshotFetcher {
    rendered: Option<Arc<dyn ArticleFetcher>>,
    direct: Arc<dyn ArticleFetcher>,
}

impl SnapshotFetcher {
    pub fn new(direct: Arc<dyn ArticleFetcher>) -> Self {
        Self {
            rendered: None,
            direct,
        }
    }

    pub fn with_rendered(mut self, rendered: Arc<dyn ArticleFetcher>) -> Self {
        self.rendered = Some(rendered);
        self
    }

    /// `None` when every fetch failed.
    pub async fn snapshot(&self, url: &str) -> Option<String> {
        if let Some(rendered) = &self.rendered {
            match rendered.fetch(url).await {
                Ok(body) => {
                    let body = body.trim();
                    let text = if looks_like_html(body) {
                        strip_html(body)
                    } else {
                        body.to_string()
                    };
                    return Some(clamp_snapshot(&text));
                }
                Err(e) => {
                    warn!(url, fetcher = rendered.name(), error = %e, "Rendered fetch failed, falling back");
                }
            }
        }

        match self.direct.fetch(url).await {
            Ok(html) => Some(clamp_snapshot(&strip_html(&html))),
            Err(e) => {
                warn!(url, fetcher = self.direct.name(), error = %e, "Direct fetch failed");
                None
            }
        }
    }
}

fn clamp_snapshot(text: &str) -> String {
    clamp_text(text, INGEST_SNAPSHOT_MAX_CHARS, INGEST_TRUNCATION_MARKER)
}
