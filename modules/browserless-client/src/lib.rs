pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://chrome.browserless.io";

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
        }
    }

    /// Build the `/content` endpoint for a target URL, query-encoded.
    pub fn content_endpoint(&self, url: &str) -> Result<url::Url> {
        let mut endpoint = url::Url::parse(&format!("{}/content", self.base_url))?;
        {
            let mut query = endpoint.query_pairs_mut();
            if let Some(ref token) = self.token {
                query.append_pair("token", token);
            }
            query.append_pair("url", url);
        }
        Ok(endpoint)
    }

    /// Fetch fully-rendered page content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let endpoint = self.content_endpoint(url)?;
        debug!(url, "Browserless content request");

        let resp = self.client.get(endpoint).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
