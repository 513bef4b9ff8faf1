use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use ai_client::{OpenAi, TextGenerator};
use browserless_client::BrowserlessClient;
use clarity_common::Config;
use clarity_store::{
    ContactStore, KeyCache, MemoryStore, NewsStore, PgStore, SubscriptionStore, Vault,
};
use clarity_worker::{ArticleFetcher, HttpArticleFetcher, TavilySearcher, WebSearcher};

use crate::error::ApiError;

/// Shared handler state. Every backend is optional so the server starts with
/// partial configuration; handlers report what is missing.
pub struct AppState {
    pub config: Config,
    pub news: Option<Arc<dyn NewsStore>>,
    pub contacts: Option<Arc<dyn ContactStore>>,
    pub memories: Option<Arc<dyn MemoryStore>>,
    pub subscriptions: Option<Arc<dyn SubscriptionStore>>,
    pub vault: Option<Vault>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub searcher: Arc<dyn WebSearcher>,
    /// Plain HTTP article fetches.
    pub fetcher: Arc<dyn ArticleFetcher>,
    /// Headless-browser fetches, when a rendering service is configured.
    pub rendered_fetcher: Option<Arc<dyn ArticleFetcher>>,
}

impl AppState {
    /// State with no backends configured.
    pub fn new(config: Config) -> Self {
        Self {
            searcher: Arc::new(TavilySearcher::new(config.tavily_api_key.as_deref())),
            config,
            news: None,
            contacts: None,
            memories: None,
            subscriptions: None,
            vault: None,
            generator: None,
            fetcher: Arc::new(HttpArticleFetcher::new()),
            rendered_fetcher: None,
        }
    }

    /// Wire real backends from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut state = Self::new(config);

        if let Some(url) = state.config.database_url.clone() {
            let store = Arc::new(PgStore::connect_lazy(&url)?);
            state = state.with_pg(store);
        } else {
            warn!("DATABASE_URL not set; database routes will return NO_DATABASE");
        }

        if let Some(key) = state.config.openai_api_key.clone() {
            let mut openai = OpenAi::new(key, state.config.openai_model.clone());
            if let Some(base) = &state.config.openai_base_url {
                openai = openai.with_base_url(base.clone());
            }
            state.generator = Some(Arc::new(openai));
        }

        if let Some(url) = state.config.browserless_url.clone() {
            info!(url = %url, "Rendered article fetches enabled");
            let client = BrowserlessClient::new(&url, state.config.browserless_token.as_deref());
            state.rendered_fetcher = Some(Arc::new(client));
        }

        Ok(state)
    }

    /// Use one Postgres store for every persistence seam.
    pub fn with_pg(mut self, store: Arc<PgStore>) -> Self {
        self.news = Some(store.clone());
        self.contacts = Some(store.clone());
        self.memories = Some(store.clone());
        self.subscriptions = Some(store.clone());
        self.vault = Some(Vault::new(Arc::new(KeyCache::new(store))));
        self
    }

    pub fn news(&self) -> Result<Arc<dyn NewsStore>, ApiError> {
        self.news.clone().ok_or_else(ApiError::no_database)
    }

    pub fn contacts(&self) -> Result<Arc<dyn ContactStore>, ApiError> {
        self.contacts.clone().ok_or_else(ApiError::no_database)
    }

    pub fn memories(&self) -> Result<Arc<dyn MemoryStore>, ApiError> {
        self.memories.clone().ok_or_else(ApiError::no_database)
    }

    pub fn subscriptions(&self) -> Result<Arc<dyn SubscriptionStore>, ApiError> {
        self.subscriptions.clone().ok_or_else(ApiError::no_database)
    }

    pub fn vault(&self) -> Result<&Vault, ApiError> {
        self.vault.as_ref().ok_or_else(ApiError::no_database)
    }

    pub fn generator(&self) -> Result<Arc<dyn TextGenerator>, ApiError> {
        self.generator.clone().ok_or_else(|| {
            ApiError::internal("OPENAI_API_KEY is not configured").with_code("NO_OPENAI_KEY")
        })
    }
}
