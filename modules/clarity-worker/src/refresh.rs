//! News refresh: search fresh stories per category, store each as a
//! research snapshot fact and score it into the neutrality ledger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use ai_client::{strip_code_blocks, GenerationRequest, TextGenerator};
use clarity_common::{
    clamp_text, outlet_from_url, sanitize_component_score, BiasComponents, BiasScores,
};
use clarity_store::{
    NewLedgerEntry, NewTruthFact, NewsStore, NEWS_DOMAIN, NEWS_STORY_CATEGORY, SYSTEM_USER_KEY,
};

use crate::batch::now_iso;
use crate::prompts::{field_text, refresh_prompt};
use crate::traits::{SearchItem, SearchOptions, WebSearcher};

const STORIES_PER_CATEGORY: u32 = 4;
const NEWS_WINDOW_DAYS: u32 = 1;
const SCORING_TIMEOUT: Duration = Duration::from_secs(25);
const MAX_OUTPUT_TOKENS: u32 = 900;

const FACT_CATEGORY: &str = "research_snapshot";
const FACT_STATUS: &str = "hypothesis";
const FACT_CONFIDENCE: &str = "medium";
const FACT_PI_SCORE: f64 = 0.5;

const STORAGE_MARKER: &str = "\n[...truncated for storage...]";
const LONG_MARKER: &str = "\n[...truncated...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsCategory {
    Top,
    Politics,
    Economy,
    World,
    Technology,
    Health,
    Culture,
    Science,
}

impl NewsCategory {
    pub const ALL: [NewsCategory; 8] = [
        NewsCategory::Top,
        NewsCategory::Politics,
        NewsCategory::Economy,
        NewsCategory::World,
        NewsCategory::Technology,
        NewsCategory::Health,
        NewsCategory::Culture,
        NewsCategory::Science,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            NewsCategory::Top => "top",
            NewsCategory::Politics => "politics",
            NewsCategory::Economy => "economy",
            NewsCategory::World => "world",
            NewsCategory::Technology => "technology",
            NewsCategory::Health => "health",
            NewsCategory::Culture => "culture",
            NewsCategory::Science => "science",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NewsCategory::Top => "Top Stories",
            NewsCategory::Politics => "Politics",
            NewsCategory::Economy => "Economy / Markets",
            NewsCategory::World => "World",
            NewsCategory::Technology => "Technology",
            NewsCategory::Health => "Health",
            NewsCategory::Culture => "Culture",
            NewsCategory::Science => "Science",
        }
    }

    pub fn query(&self) -> &'static str {
        match self {
            NewsCategory::Top => "top news in the United States today",
            NewsCategory::Politics => "top U.S. political news today",
            NewsCategory::Economy => "top U.S. economy and markets news today",
            NewsCategory::World => "top world news today",
            NewsCategory::Technology => "top technology news today",
            NewsCategory::Health => "top health and medical news today",
            NewsCategory::Culture => "top culture, arts, and entertainment news today",
            NewsCategory::Science => "top science and research news today",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub fetched: usize,
    pub inserted_facts: usize,
    pub inserted_neutrality: usize,
    pub failed_facts: usize,
    pub failed_neutrality: usize,
}

impl CategoryStats {
    pub fn summary_line(&self, category: NewsCategory) -> String {
        format!(
            "{}: fetched {}, facts inserted {}, neutrality rows {}, fact failures {}, neutrality failures {}",
            category.display_name(),
            self.fetched,
            self.inserted_facts,
            self.inserted_neutrality,
            self.failed_facts,
            self.failed_neutrality
        )
    }
}

/// Per-category stats, serialized as an object in category order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshStats(pub Vec<(NewsCategory, CategoryStats)>);

impl RefreshStats {
    pub fn get(&self, category: NewsCategory) -> Option<&CategoryStats> {
        self.0.iter().find(|(c, _)| *c == category).map(|(_, s)| s)
    }
}

impl Serialize for RefreshStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, stats) in &self.0 {
            map.serialize_entry(category.key(), stats)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub ok: bool,
    pub started_at: String,
    pub finished_at: String,
    pub stats: RefreshStats,
    pub summary: Vec<String>,
}

/// Model output for one refreshed story.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshScore {
    pub neutral_summary: String,
    pub notes: String,
    pub components: BiasComponents,
}

pub struct RefreshWorker {
    store: Arc<dyn NewsStore>,
    generator: Arc<dyn TextGenerator>,
    searcher: Arc<dyn WebSearcher>,
    model: String,
    workspace_id: String,
}

impl RefreshWorker {
    pub fn new(
        store: Arc<dyn NewsStore>,
        generator: Arc<dyn TextGenerator>,
        searcher: Arc<dyn WebSearcher>,
        model: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            generator,
            searcher,
            model: model.into(),
            workspace_id: workspace_id.into(),
        }
    }

    pub async fn run(&self) -> Result<RefreshReport> {
        let started_at = now_iso();
        let mut stats = Vec::with_capacity(NewsCategory::ALL.len());

        for category in NewsCategory::ALL {
            let category_stats = self.refresh_category(category).await;
            info!(category = category.key(), ?category_stats, "Category refreshed");
            stats.push((category, category_stats));
        }

        let summary = stats
            .iter()
            .map(|(category, s)| s.summary_line(*category))
            .collect();

        Ok(RefreshReport {
            ok: true,
            started_at,
            finished_at: now_iso(),
            stats: RefreshStats(stats),
            summary,
        })
    }

    async fn refresh_category(&self, category: NewsCategory) -> CategoryStats {
        let mut stats = CategoryStats::default();
        let options = SearchOptions {
            max_results: STORIES_PER_CATEGORY,
            news: true,
            days: Some(NEWS_WINDOW_DAYS),
        };

        let items = match self.searcher.search(category.query(), options).await {
            Ok(items) => items,
            Err(e) => {
                warn!(category = category.key(), error = %e, "News search failed");
                return stats;
            }
        };
        stats.fetched = items.len();

        for item in &items {
            if item.url.is_empty() {
                stats.failed_facts += 1;
                stats.failed_neutrality += 1;
                continue;
            }

            let fact = self.fact_for(category, item);
            let truth_fact_id = match self.store.insert_fact(&fact).await {
                Ok(id) => {
                    stats.inserted_facts += 1;
                    Some(id)
                }
                Err(e) => {
                    warn!(
                        category = category.key(),
                        url = %item.url,
                        error = %e,
                        "truth_facts insert failed"
                    );
                    stats.failed_facts += 1;
                    None
                }
            };

            if self.score_item(category, item, truth_fact_id).await {
                stats.inserted_neutrality += 1;
            } else {
                stats.failed_neutrality += 1;
            }
        }

        stats
    }

    fn fact_for(&self, category: NewsCategory, item: &SearchItem) -> NewTruthFact {
        let title = item_title(item);
        let summary_source = if item.content.is_empty() { title } else { &item.content };

        NewTruthFact {
            workspace_id: self.workspace_id.clone(),
            user_key: SYSTEM_USER_KEY.into(),
            query: Some(category.query().into()),
            summary: Some(clamp_text(summary_source, 1200, STORAGE_MARKER)),
            scientific_domain: NEWS_DOMAIN.into(),
            category: FACT_CATEGORY.into(),
            status: FACT_STATUS.into(),
            confidence_level: Some(FACT_CONFIDENCE.into()),
            pi_score: Some(FACT_PI_SCORE),
            sources: json!([{
                "kind": "news",
                "title": title,
                "url": item.url,
                "category": category.key(),
                "fetched_at": now_iso(),
            }]),
            raw_url: item.url.clone(),
            raw_snapshot: Some(clamp_text(&item.content, 4000, LONG_MARKER))
                .filter(|s| !s.is_empty()),
        }
    }

    /// Score one story and write its ledger row. `false` on any failure.
    async fn score_item(
        &self,
        category: NewsCategory,
        item: &SearchItem,
        truth_fact_id: Option<Uuid>,
    ) -> bool {
        let title = item_title(item);
        let Some(score) = self.score_story(category, item).await else {
            return false;
        };

        let scores = BiasScores::derived(score.components);
        let raw_story = if item.content.is_empty() {
            &score.neutral_summary
        } else {
            &item.content
        };

        let entry = NewLedgerEntry {
            workspace_id: self.workspace_id.clone(),
            user_key: SYSTEM_USER_KEY.into(),
            user_id: None,
            truth_fact_id,
            story_id: item.url.clone(),
            story_title: title.to_string(),
            story_url: Some(item.url.clone()),
            outlet: Some(outlet_from_url(&item.url).unwrap_or_else(|| "unknown".into())),
            category: NEWS_STORY_CATEGORY.into(),
            raw_story: Some(clamp_text(raw_story, 6000, LONG_MARKER)),
            neutral_summary: Some(clamp_text(&score.neutral_summary, 2000, STORAGE_MARKER)),
            notes: Some(score.notes),
            scores,
        };

        match self.store.insert_ledger(&entry).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    category = category.key(),
                    url = %item.url,
                    error = %e,
                    "neutrality_ledger insert failed"
                );
                false
            }
        }
    }

    async fn score_story(
        &self,
        category: NewsCategory,
        item: &SearchItem,
    ) -> Option<RefreshScore> {
        let title = item_title(item);
        let story_source = if item.content.is_empty() { title } else { &item.content };
        let story = clamp_text(story_source, 3500, LONG_MARKER);

        let prompt = refresh_prompt(title, &item.url, category.display_name(), &story);
        let request = GenerationRequest::new(&self.model, prompt)
            .max_output_tokens(MAX_OUTPUT_TOKENS)
            .temperature(0.0);

        let call = self.generator.generate(request);
        let generation = match tokio::time::timeout(SCORING_TIMEOUT, call).await {
            Ok(generation) => generation,
            Err(_) => {
                warn!(url = %item.url, "Refresh scoring timed out");
                return None;
            }
        };

        match generation.into_text() {
            Ok(raw) => parse_refresh_score(&raw),
            Err(e) => {
                warn!(url = %item.url, error = %e, "Refresh scoring failed");
                None
            }
        }
    }
}

fn item_title(item: &SearchItem) -> &str {
    if item.title.is_empty() {
        "(untitled)"
    } else {
        &item.title
    }
}

/// Fence-stripped strict JSON. Components are sanitized to `[0, 3]`;
/// `None` when the JSON is invalid or has no neutral summary.
pub fn parse_refresh_score(raw: &str) -> Option<RefreshScore> {
    let v: serde_json::Value = match serde_json::from_str(strip_code_blocks(raw)) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Failed to parse refresh scoring JSON");
            return None;
        }
    };

    let neutral_summary = field_text(&v["neutral_summary"]);
    if neutral_summary.is_empty() {
        warn!("Refresh scoring JSON missing neutral_summary");
        return None;
    }

    Some(RefreshScore {
        neutral_summary,
        notes: match &v["notes"] {
            serde_json::Value::String(s) => s.clone(),
            other => field_text(other),
        },
        components: BiasComponents {
            language: sanitize_component_score(&v["bias_language_score"]),
            source: sanitize_component_score(&v["bias_source_score"]),
            framing: sanitize_component_score(&v["bias_framing_score"]),
            context: sanitize_component_score(&v["bias_context_score"]),
        },
    })
}
