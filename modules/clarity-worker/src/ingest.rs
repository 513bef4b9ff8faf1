//! Backfill ingest: turn queued story URLs into `truth_facts` snapshots for
//! the scoring worker to pick up.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use clarity_common::outlet_from_url;
use clarity_store::{
    NewTruthFact, NewsStore, QueueRow, NEWS_DOMAIN, NEWS_STORY_CATEGORY, SYSTEM_USER_KEY,
};

use crate::batch::{now_iso, oversample, run_sequential, ItemResult, Skipped};
use crate::fetch::SnapshotFetcher;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 20;

const INGESTED_STATUS: &str = "ingested";
const DEFAULT_SOURCE: &str = "rss";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub ok: bool,
    pub started_at: String,
    pub finished_at: String,
    pub limit: u32,
    pub total_candidates: usize,
    pub ingested: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub skipped: Vec<Skipped>,
    pub errors: Vec<String>,
    pub details: Vec<Value>,
}

pub struct IngestWorker {
    store: Arc<dyn NewsStore>,
    snapshots: SnapshotFetcher,
    workspace_id: String,
    oversample_factor: u32,
}

impl IngestWorker {
    pub fn new(
        store: Arc<dyn NewsStore>,
        snapshots: SnapshotFetcher,
        workspace_id: impl Into<String>,
        oversample_factor: u32,
    ) -> Self {
        Self {
            store,
            snapshots,
            workspace_id: workspace_id.into(),
            oversample_factor,
        }
    }

    pub async fn run(&self, limit: u32) -> Result<IngestReport> {
        let started_at = now_iso();
        let candidates = self.pending_rows(limit).await?;
        info!(limit, candidates = candidates.len(), "Ingesting backfill queue");

        let outcome = run_sequential(
            candidates,
            |row| row.id.to_string(),
            |row| async move { self.ingest_row(&row).await },
        )
        .await;

        info!(
            ingested = outcome.updated_count(),
            skipped = outcome.skipped_count(),
            errors = outcome.error_count(),
            "Ingest batch complete"
        );

        Ok(IngestReport {
            ok: true,
            started_at,
            finished_at: now_iso(),
            limit,
            total_candidates: outcome.attempted(),
            ingested: outcome.updated_count(),
            updated_count: outcome.updated_count(),
            skipped_count: outcome.skipped_count(),
            error_count: outcome.error_count(),
            errors: outcome.error_messages(),
            skipped: outcome.skipped,
            details: outcome.updated,
        })
    }

    /// Oldest queue rows with a URL and no existing fact, up to `limit`.
    async fn pending_rows(&self, limit: u32) -> Result<Vec<QueueRow>> {
        let rows = self
            .store
            .queue_batch(oversample(limit, self.oversample_factor))
            .await
            .context("Failed to fetch queue rows")?;

        let mut pending = Vec::new();
        for row in rows {
            let Some(url) = row.story_url.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            match self.store.fact_exists_for_url(url).await {
                Ok(false) => pending.push(row),
                Ok(true) => {}
                Err(e) => warn!(url, error = %e, "truth_facts existence check failed"),
            }
            if pending.len() >= limit as usize {
                break;
            }
        }
        Ok(pending)
    }

    async fn ingest_row(&self, row: &QueueRow) -> Result<ItemResult> {
        let Some(url) = row.story_url.as_deref() else {
            return Ok(ItemResult::Skipped("no story_url".into()));
        };

        let body = self.snapshots.snapshot(url).await.unwrap_or_default();
        if body.trim().is_empty() {
            warn!(url, "Empty snapshot body");
            return Ok(ItemResult::Skipped("empty snapshot".into()));
        }

        let outlet = row
            .outlet
            .clone()
            .filter(|o| !o.is_empty())
            .or_else(|| outlet_from_url(url));
        let source = row
            .source
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE.into());

        let fact = NewTruthFact {
            workspace_id: self.workspace_id.clone(),
            user_key: SYSTEM_USER_KEY.into(),
            query: Some(url.to_string()),
            summary: None,
            scientific_domain: NEWS_DOMAIN.into(),
            category: NEWS_STORY_CATEGORY.into(),
            status: INGESTED_STATUS.into(),
            confidence_level: None,
            pi_score: None,
            sources: json!({ "outlet": outlet, "source": source, "backfill": true }),
            raw_url: url.to_string(),
            raw_snapshot: Some(body),
        };

        self.store
            .insert_fact(&fact)
            .await
            .with_context(|| format!("Failed to ingest queue_id={} url={url}", row.id))?;

        // A stale queue row is re-checked against truth_facts next run.
        if let Err(e) = self.store.delete_queue_row(row.id).await {
            warn!(queue_id = %row.id, url, error = %e, "Failed to delete backfill queue row");
        }

        Ok(ItemResult::Updated(json!({
            "queue_id": row.id,
            "outlet": row.outlet,
            "story_url": row.story_url,
            "source": row.source,
        })))
    }
}
