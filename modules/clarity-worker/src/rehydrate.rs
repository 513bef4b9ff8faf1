//! Digest rehydration: regenerate placeholder summaries from the source
//! article and write them back to the underlying truth fact.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use ai_client::{salvage_json_object, GenerationRequest, TextGenerator};
use clarity_common::{is_placeholder_summary, take_chars};
use clarity_store::{DigestRow, NewsStore};

use crate::batch::{oversample, run_sequential, Failed, ItemResult, Skipped};
use crate::fetch::strip_html_to_text;
use crate::prompts::{field_text, summarize_prompt};
use crate::traits::ArticleFetcher;

pub const DEFAULT_LIMIT: u32 = 8;
pub const MAX_LIMIT: u32 = 25;

/// Articles shorter than this are not worth summarizing.
pub const MIN_ARTICLE_CHARS: usize = 400;
const PROMPT_ARTICLE_MAX_CHARS: usize = 12_000;
const MAX_OUTPUT_TOKENS: u32 = 512;
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct Summarization {
    pub summary: String,
    pub key_facts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RehydrateReport {
    pub ok: bool,
    pub requested_limit: u32,
    pub scanned_rows: usize,
    pub candidates: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub updated: Vec<Value>,
    pub skipped: Vec<Skipped>,
    pub errors: Vec<Failed>,
}

pub struct RehydrateWorker {
    store: Arc<dyn NewsStore>,
    generator: Arc<dyn TextGenerator>,
    fetcher: Arc<dyn ArticleFetcher>,
    model: String,
    oversample_factor: u32,
}

impl RehydrateWorker {
    pub fn new(
        store: Arc<dyn NewsStore>,
        generator: Arc<dyn TextGenerator>,
        fetcher: Arc<dyn ArticleFetcher>,
        model: impl Into<String>,
        oversample_factor: u32,
    ) -> Self {
        Self {
            store,
            generator,
            fetcher,
            model: model.into(),
            oversample_factor,
        }
    }

    pub async fn run(&self, limit: u32) -> Result<RehydrateReport> {
        let rows = self
            .store
            .recent_digest_rows(oversample(limit, self.oversample_factor))
            .await
            .context("Failed to load digest view rows")?;
        let scanned_rows = rows.len();

        let candidates: Vec<DigestRow> = rows
            .into_iter()
            .filter(|r| is_placeholder_summary(r.neutral_summary.as_deref()))
            .collect();
        let candidate_count = candidates.len();
        info!(limit, scanned_rows, candidates = candidate_count, "Rehydrating digest");

        let outcome = run_sequential(
            candidates.into_iter().take(limit as usize),
            id_label,
            |row| async move { self.rehydrate_row(&row).await },
        )
        .await;

        info!(
            updated = outcome.updated_count(),
            skipped = outcome.skipped_count(),
            errors = outcome.error_count(),
            "Rehydration batch complete"
        );

        Ok(RehydrateReport {
            ok: true,
            requested_limit: limit,
            scanned_rows,
            candidates: candidate_count,
            updated_count: outcome.updated_count(),
            skipped_count: outcome.skipped_count(),
            error_count: outcome.error_count(),
            updated: outcome.updated,
            skipped: outcome.skipped,
            errors: outcome.failed,
        })
    }

    async fn rehydrate_row(&self, row: &DigestRow) -> Result<ItemResult> {
        let Some(url) = row.story_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(ItemResult::Skipped("no story_url".into()));
        };

        let text = self.article_text(url).await;
        if text.chars().count() < MIN_ARTICLE_CHARS {
            return Ok(ItemResult::Skipped("no usable article text".into()));
        }

        let Some(summarization) = self.summarize(&text).await else {
            return Ok(ItemResult::Skipped("summarization failed".into()));
        };

        let truth_fact_id = row
            .truth_fact_id
            .ok_or_else(|| anyhow!("Row has no truth_fact_id"))?;
        self.store
            .update_fact_summary(truth_fact_id, &summarization.summary, &summarization.key_facts)
            .await?;

        Ok(ItemResult::Updated(json!({
            "id": id_label(row),
            "outlet": row.outlet,
            "story_title": row.story_title,
            "url": row.story_url,
        })))
    }

    /// Stripped article text, or empty when the fetch fails.
    async fn article_text(&self, url: &str) -> String {
        match self.fetcher.fetch(url).await {
            Ok(html) => strip_html_to_text(&html),
            Err(e) => {
                warn!(url, fetcher = self.fetcher.name(), error = %e, "Article fetch failed");
                String::new()
            }
        }
    }

    async fn summarize(&self, article_text: &str) -> Option<Summarization> {
        let prompt = summarize_prompt(take_chars(article_text, PROMPT_ARTICLE_MAX_CHARS));
        let request = GenerationRequest::new(&self.model, prompt)
            .max_output_tokens(MAX_OUTPUT_TOKENS)
            .temperature(TEMPERATURE);

        match self.generator.generate(request).await.into_text() {
            Ok(raw) => parse_summarization(&raw),
            Err(e) => {
                warn!(error = %e, "Summarization call failed");
                None
            }
        }
    }
}

fn id_label(row: &DigestRow) -> String {
    row.truth_fact_id.unwrap_or(row.ledger_id).to_string()
}

/// `None` unless the output holds a JSON object with a non-empty summary.
/// Key facts are trimmed and blanks dropped.
pub fn parse_summarization(raw: &str) -> Option<Summarization> {
    let v = salvage_json_object(raw.trim())?;
    let summary = field_text(&v["summary"]);
    if summary.is_empty() {
        return None;
    }

    let key_facts = v["key_facts"]
        .as_array()
        .map(|facts| {
            facts
                .iter()
                .map(|f| match f {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|f| !f.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Summarization { summary, key_facts })
}
