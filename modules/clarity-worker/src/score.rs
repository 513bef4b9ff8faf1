//! Bias scoring for ingested news facts.
//!
//! Picks recent news facts with no ledger row, asks the scoring model for a
//! neutral summary plus four component scores, recomputes the intent score
//! locally and writes one `neutrality_ledger` row per fact.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use ai_client::{salvage_json_object, GenerationRequest, TextGenerator};
use clarity_common::{
    clamp_text, first_line, outlet_from_url, safe_number, BiasComponents, BiasScores,
    DEFAULT_COMPONENT_SCORE, DEFAULT_PI_SCORE, MAX_COMPONENT_SCORE,
};
use clarity_store::{NewLedgerEntry, NewsStore, TruthFact, SYSTEM_USER_KEY};

use crate::batch::{now_iso, oversample, run_sequential, ItemResult, Skipped};
use crate::prompts::{field_text, scoring_prompt};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 50;

const BODY_MAX_CHARS: usize = 6000;
const BODY_TRUNCATION_MARKER: &str = "\n[...truncated for scoring...]";
const MAX_OUTPUT_TOKENS: u32 = 800;
const FALLBACK_WORKSPACE: &str = "global_news";
const UNTITLED: &str = "(untitled story)";
const LEDGER_CATEGORY: &str = "news";

/// Parsed and clamped model output for one story.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryScore {
    pub neutral_summary: String,
    pub notes: String,
    pub scores: BiasScores,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub ok: bool,
    pub model: String,
    pub started_at: String,
    pub finished_at: String,
    pub limit: u32,
    pub total_candidates: usize,
    pub scored: usize,
    /// Facts passed over during selection because a ledger row exists.
    pub skipped_existing: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub skipped: Vec<Skipped>,
    pub errors: Vec<String>,
    pub details: Vec<Value>,
}

pub struct ScoreWorker {
    store: Arc<dyn NewsStore>,
    generator: Arc<dyn TextGenerator>,
    model: String,
    oversample_factor: u32,
}

impl ScoreWorker {
    pub fn new(
        store: Arc<dyn NewsStore>,
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        oversample_factor: u32,
    ) -> Self {
        Self {
            store,
            generator,
            model: model.into(),
            oversample_factor,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn run(&self, limit: u32) -> Result<ScoreReport> {
        let started_at = now_iso();
        let (candidates, skipped_existing) = self.unscored_facts(limit).await?;
        info!(
            limit,
            candidates = candidates.len(),
            skipped_existing,
            "Scoring news facts"
        );

        let outcome = run_sequential(
            candidates,
            |fact| fact.id.to_string(),
            |fact| async move { self.score_fact(&fact).await },
        )
        .await;

        info!(
            scored = outcome.updated_count(),
            skipped = outcome.skipped_count(),
            errors = outcome.error_count(),
            "Scoring batch complete"
        );

        Ok(ScoreReport {
            ok: true,
            model: self.model.clone(),
            started_at,
            finished_at: now_iso(),
            limit,
            total_candidates: outcome.attempted(),
            scored: outcome.updated_count(),
            skipped_existing,
            updated_count: outcome.updated_count(),
            skipped_count: outcome.skipped_count(),
            error_count: outcome.error_count(),
            errors: outcome.error_messages(),
            skipped: outcome.skipped,
            details: outcome.updated,
        })
    }

    /// Up to `limit` recent facts with no ledger row, plus how many scored
    /// facts were passed over. A failed existence check drops the fact.
    async fn unscored_facts(&self, limit: u32) -> Result<(Vec<TruthFact>, usize)> {
        let facts = self
            .store
            .recent_news_facts(oversample(limit, self.oversample_factor))
            .await
            .context("Failed to fetch truth_facts")?;

        let mut selected = Vec::new();
        let mut already_scored = 0;
        for fact in facts {
            match self.store.ledger_exists(fact.id).await {
                Ok(true) => already_scored += 1,
                Ok(false) => selected.push(fact),
                Err(e) => warn!(truth_fact_id = %fact.id, error = %e, "Ledger check failed"),
            }
            if selected.len() >= limit as usize {
                break;
            }
        }
        Ok((selected, already_scored))
    }

    async fn score_fact(&self, fact: &TruthFact) -> Result<ItemResult> {
        let body = story_body(fact);
        if body.trim().is_empty() {
            return Ok(ItemResult::Skipped("empty body".into()));
        }

        let url = fact.raw_url.as_deref().unwrap_or("");
        let title = fact
            .summary
            .as_deref()
            .map(first_line)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);
        let outlet = outlet_from_url(url).unwrap_or_else(|| "unknown-outlet".to_string());

        let prompt = scoring_prompt(title, &outlet, url, &body);
        let request = GenerationRequest::new(&self.model, prompt)
            .json_mode()
            .max_output_tokens(MAX_OUTPUT_TOKENS);

        let parsed = match self.generator.generate(request).await.into_text() {
            Ok(raw) => parse_story_score(&raw),
            Err(e) => {
                warn!(truth_fact_id = %fact.id, error = %e, "Scoring model returned no text");
                None
            }
        };
        let Some(score) = parsed else {
            return Ok(ItemResult::Failed(format!(
                "No scoring result for truth_fact_id={}",
                fact.id
            )));
        };
        if score.neutral_summary.is_empty() {
            warn!(truth_fact_id = %fact.id, "Missing neutral_summary");
        }

        let outlet = outlet_from_url(url);
        let entry = ledger_entry(fact, &score, outlet.clone());
        self.store
            .insert_ledger(&entry)
            .await
            .with_context(|| format!("Insert error for truth_fact_id={}", fact.id))?;

        let s = score.scores;
        Ok(ItemResult::Updated(json!({
            "truth_fact_id": fact.id,
            "story_url": fact.raw_url,
            "outlet": outlet,
            "bias_intent_score": s.bias_intent_score,
            "bias_language_score": s.bias_language_score,
            "bias_source_score": s.bias_source_score,
            "bias_framing_score": s.bias_framing_score,
            "bias_context_score": s.bias_context_score,
            "pi_score": s.pi_score,
        })))
    }
}

/// Snapshot if present, else the summary, clamped for the prompt.
fn story_body(fact: &TruthFact) -> String {
    let raw = fact
        .raw_snapshot
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(fact.summary.as_deref())
        .unwrap_or("");
    clamp_text(raw, BODY_MAX_CHARS, BODY_TRUNCATION_MARKER)
}

/// Parse model output. Components fall back to the midpoint and PI to 0.5;
/// the intent score is always recomputed. `None` when no JSON object can be
/// recovered.
pub fn parse_story_score(raw: &str) -> Option<StoryScore> {
    let v = salvage_json_object(raw)?;
    let component =
        |key: &str| safe_number(&v[key], DEFAULT_COMPONENT_SCORE, 0.0, MAX_COMPONENT_SCORE);

    let components = BiasComponents {
        language: component("bias_language_score"),
        source: component("bias_source_score"),
        framing: component("bias_framing_score"),
        context: component("bias_context_score"),
    };
    let pi = safe_number(&v["pi_score"], DEFAULT_PI_SCORE, 0.0, 1.0);

    Some(StoryScore {
        neutral_summary: field_text(&v["neutral_summary"]),
        notes: field_text(&v["notes"]),
        scores: BiasScores::new(components, pi),
    })
}

fn ledger_entry(fact: &TruthFact, score: &StoryScore, outlet: Option<String>) -> NewLedgerEntry {
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    NewLedgerEntry {
        workspace_id: non_empty(&fact.workspace_id).unwrap_or_else(|| FALLBACK_WORKSPACE.into()),
        user_key: non_empty(&fact.user_key).unwrap_or_else(|| SYSTEM_USER_KEY.into()),
        user_id: non_empty(&fact.user_id),
        truth_fact_id: Some(fact.id),
        story_id: non_empty(&fact.raw_url).unwrap_or_else(|| fact.id.to_string()),
        story_title: non_empty(&fact.summary).unwrap_or_else(|| UNTITLED.into()),
        story_url: fact.raw_url.clone(),
        outlet,
        category: LEDGER_CATEGORY.into(),
        raw_story: non_empty(&fact.raw_snapshot).or_else(|| fact.summary.clone()),
        neutral_summary: Some(score.neutral_summary.clone()),
        notes: Some(score.notes.clone()).filter(|n| !n.is_empty()),
        scores: score.scores,
    }
}
