use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::traits::{SearchItem, SearchOptions, WebSearcher};

pub const TAVILY_API_URL: &str = "https://api.tavily.com/search";

// --- Tavily ---

pub struct TavilySearcher {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Option<Vec<TavilyResult>>,
    #[serde(default)]
    news: Option<Vec<TavilyResult>>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl TavilySearcher {
    /// A searcher without a key returns no results.
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
            endpoint: TAVILY_API_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(25))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request<'a>(
        &self,
        api_key: &'a str,
        query: &'a str,
        options: SearchOptions,
    ) -> TavilyRequest<'a> {
        TavilyRequest {
            api_key,
            query,
            search_depth: "basic",
            max_results: options.max_results.clamp(1, 10),
            search_type: options.news.then_some("news"),
            days: options.days.filter(|d| options.news && *d > 0),
        }
    }
}

impl TavilyResponse {
    fn into_items(self) -> Vec<SearchItem> {
        self.results
            .or(self.news)
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                let url = r.url.unwrap_or_default();
                SearchItem {
                    title: non_empty(r.title)
                        .or_else(|| non_empty(Some(url.clone())))
                        .unwrap_or_else(|| "result".to_string()),
                    content: non_empty(r.content).or(non_empty(r.snippet)).unwrap_or_default(),
                    url,
                }
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchItem>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(query, "TAVILY_API_KEY not set, skipping search");
            return Ok(Vec::new());
        };

        info!(
            query,
            max_results = options.max_results,
            news = options.news,
            "Tavily search"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.request(api_key, query, options))
            .send()
            .await
            .context("Tavily API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Tavily returned HTTP {}", status.as_u16());
        }

        let data: TavilyResponse = resp
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        let items = data.into_items();
        info!(query, count = items.len(), "Tavily search complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_clamps_and_sets_news_fields() {
        let searcher = TavilySearcher::new(Some("key"));
        let opts = SearchOptions {
            max_results: 40,
            news: true,
            days: Some(1),
        };
        let body = serde_json::to_value(searcher.request("key", "top news", opts)).unwrap();
        assert_eq!(body["max_results"], 10);
        assert_eq!(body["search_type"], "news");
        assert_eq!(body["days"], 1);
        assert_eq!(body["search_depth"], "basic");
    }

    #[test]
    fn request_omits_news_fields_for_web_search() {
        let searcher = TavilySearcher::new(Some("key"));
        let opts = SearchOptions {
            max_results: 0,
            news: false,
            days: Some(3),
        };
        let body = serde_json::to_value(searcher.request("key", "q", opts)).unwrap();
        assert_eq!(body["max_results"], 1);
        assert!(body.get("search_type").is_none());
        assert!(body.get("days").is_none());
    }

    #[test]
    fn items_fall_back_through_fields() {
        let resp: TavilyResponse = serde_json::from_value(json!({
            "news": [
                { "url": "https://a.com/x", "snippet": "short" },
                { "title": "T", "url": "https://b.com", "content": "long" },
                {}
            ]
        }))
        .unwrap();
        let items = resp.into_items();
        assert_eq!(items[0].title, "https://a.com/x");
        assert_eq!(items[0].content, "short");
        assert_eq!(items[1].title, "T");
        assert_eq!(items[1].content, "long");
        assert_eq!(items[2].title, "result");
        assert_eq!(items[2].url, "");
    }

    #[tokio::test]
    async fn missing_key_returns_nothing() {
        let searcher = TavilySearcher::new(None);
        let items = searcher
            .search("top news", SearchOptions::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn blank_query_returns_nothing() {
        let searcher = TavilySearcher::new(Some("key")).with_endpoint("http://127.0.0.1:9/search");
        assert!(searcher
            .search("   ", SearchOptions::default())
            .await
            .unwrap()
            .is_empty());
    }
}
