// Test mocks for the batch workers.
//
// Three mocks matching the three network seams:
// - MockGenerator (TextGenerator): replies matched by prompt substring,
//   then a fallback; records every request
// - MockFetcher (ArticleFetcher): HashMap-based URL→body
// - MockSearcher (WebSearcher): HashMap-based query→items
//
// Stores come from clarity_store::testing::InMemoryStore.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use ai_client::{AiError, Generation, GenerationRequest, TextGenerator};

use crate::traits::{ArticleFetcher, SearchItem, SearchOptions, WebSearcher};

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Empty,
    Fail,
}

impl Reply {
    fn to_generation(&self) -> Generation {
        match self {
            Reply::Text(t) => Generation::Text(t.clone()),
            Reply::Empty => Generation::Empty,
            Reply::Fail => Generation::Failed(AiError::Network("MockGenerator: failure".into())),
        }
    }
}

/// Rule-based text generator. The first rule whose needle appears in the
/// prompt wins; with no match the fallback is used (a failure by default).
/// Builder pattern: `.on_prompt()`, `.fail_on_prompt()`, `.otherwise()`.
pub struct MockGenerator {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Fail,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on_prompt(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.rules.push((needle.to_string(), Reply::Text(reply.into())));
        self
    }

    pub fn empty_on_prompt(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Empty));
        self
    }

    pub fn fail_on_prompt(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail));
        self
    }

    /// Reply for prompts no rule matches.
    pub fn otherwise(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Reply::Text(reply.into());
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Generation {
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.input.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback)
            .to_generation();
        self.requests.lock().unwrap().push(request);
        reply
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based article fetcher. Returns `Err` for unregistered URLs.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockFetcher: no page registered for {url}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// HashMap-based searcher. Unregistered queries return no items.
pub struct MockSearcher {
    results: HashMap<String, Vec<SearchItem>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, SearchOptions)>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, items: Vec<SearchItem>) -> Self {
        self.results.insert(query.to_string(), items);
        self
    }

    pub fn fail_query(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, SearchOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchItem>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), options));
        if self.failing.contains(query) {
            anyhow::bail!("MockSearcher: search failed for {query}");
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

/// A search hit with title, URL and content.
pub fn search_item(title: &str, url: &str, content: &str) -> SearchItem {
    SearchItem {
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
    }
}

/// A well-formed scoring reply with every component set to `component`.
pub fn scoring_reply(component: f64, pi: f64) -> String {
    serde_json::json!({
        "neutral_summary": "A neutral account of the events described.",
        "bias_language_score": component,
        "bias_source_score": component,
        "bias_framing_score": component,
        "bias_context_score": component,
        "bias_intent_score": component,
        "pi_score": pi,
        "notes": "Scored in test.",
    })
    .to_string()
}
