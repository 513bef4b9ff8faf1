//! Backfill producer: search each tracked outlet's recent stories and place
//! their URLs on `news_backfill_queue` for [`crate::IngestWorker`] to fetch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use clarity_store::{NewQueueItem, NewsStore};

use crate::batch::now_iso;
use crate::traits::{SearchOptions, WebSearcher};

pub const DEFAULT_DAYS: u32 = 90;
pub const QUEUE_SOURCE: &str = "tavily";

/// A tracked outlet and how to search for its stories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutletConfig {
    pub canonical: String,
    pub query: String,
    pub max_results: u32,
}

impl OutletConfig {
    /// Site-restricted search for a domain.
    pub fn site(canonical: &str, max_results: u32) -> Self {
        Self {
            canonical: canonical.to_string(),
            query: format!("site:{canonical}"),
            max_results,
        }
    }
}

/// Outlets backfilled when a request names none.
pub fn default_outlets() -> Vec<OutletConfig> {
    ["npr.org", "bbc.com", "reuters.com", "foxnews.com", "nytimes.com"]
        .into_iter()
        .map(|domain| OutletConfig::site(domain, 150))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletBackfill {
    pub outlet: String,
    /// Newly queued URLs.
    pub tavily_queued: usize,
    pub already_queued: usize,
    pub failed: usize,
    /// Set when the outlet is untracked or its search failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub ok: bool,
    pub started_at: String,
    pub finished_at: String,
    pub days: u32,
    pub total_queued: usize,
    pub outlets: Vec<OutletBackfill>,
}

pub struct BackfillWorker {
    store: Arc<dyn NewsStore>,
    searcher: Arc<dyn WebSearcher>,
    outlets: Vec<OutletConfig>,
}

impl BackfillWorker {
    pub fn new(store: Arc<dyn NewsStore>, searcher: Arc<dyn WebSearcher>) -> Self {
        Self {
            store,
            searcher,
            outlets: default_outlets(),
        }
    }

    pub fn with_outlets(mut self, outlets: Vec<OutletConfig>) -> Self {
        self.outlets = outlets;
        self
    }

    /// Backfill `requested` outlets, or every tracked outlet when empty.
    /// Outlets are processed in order; one failing never stops the rest.
    pub async fn run(&self, days: u32, requested: &[String]) -> BackfillReport {
        let started_at = now_iso();
        let days = days.max(1);
        let targets: Vec<String> = if requested.is_empty() {
            self.outlets.iter().map(|o| o.canonical.clone()).collect()
        } else {
            requested.to_vec()
        };
        info!(days, outlets = targets.len(), "Backfilling news queue");

        let mut outlets = Vec::with_capacity(targets.len());
        for canonical in &targets {
            outlets.push(self.backfill_outlet(canonical, days).await);
        }

        let total_queued = outlets.iter().map(|o| o.tavily_queued).sum();
        info!(total_queued, "Backfill complete");

        BackfillReport {
            ok: true,
            started_at,
            finished_at: now_iso(),
            days,
            total_queued,
            outlets,
        }
    }

    async fn backfill_outlet(&self, canonical: &str, days: u32) -> OutletBackfill {
        let mut result = OutletBackfill {
            outlet: canonical.to_string(),
            ..Default::default()
        };

        let Some(config) = self.outlets.iter().find(|o| o.canonical == canonical) else {
            warn!(outlet = canonical, "No backfill config for outlet");
            result.error = Some("unknown outlet".into());
            return result;
        };

        let options = SearchOptions {
            max_results: config.max_results,
            news: true,
            days: Some(days),
        };
        let items = match self.searcher.search(&config.query, options).await {
            Ok(items) => items,
            Err(e) => {
                warn!(outlet = canonical, error = %e, "Backfill search failed");
                result.error = Some(format!("search failed: {e}"));
                return result;
            }
        };

        for item in items.iter().filter(|i| !i.url.is_empty()) {
            let queued = NewQueueItem {
                outlet: config.canonical.clone(),
                story_url: item.url.clone(),
                source: QUEUE_SOURCE.to_string(),
            };
            match self.store.enqueue_story(&queued).await {
                Ok(true) => result.tavily_queued += 1,
                Ok(false) => result.already_queued += 1,
                Err(e) => {
                    warn!(outlet = canonical, url = %item.url, error = %e, "Enqueue failed");
                    result.failed += 1;
                }
            }
        }

        result
    }
}
