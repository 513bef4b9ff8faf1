// Network seams for the batch workers.
//
// ArticleFetcher: fetch a story page body (raw HTML or pre-rendered text).
// WebSearcher: news search used by the refresh and backfill workers.
//
// Workers hold these as trait objects so tests run against MockFetcher and
// MockSearcher with no network.

use anyhow::Result;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// ArticleFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Response body for `url`. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
impl ArticleFetcher for browserless_client::BrowserlessClient {
    async fn fetch(&self, url: &str) -> Result<String> {
        Ok(self.content(url).await?)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub max_results: u32,
    pub news: bool,
    /// Look-back window in days; news searches only.
    pub days: Option<u32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            news: false,
            days: None,
        }
    }
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchItem>>;
}
