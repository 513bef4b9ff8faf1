use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use clarity_common::canonical_outlet;
use clarity_store::OutletSort;
use clarity_worker::batch::{clamp_limit, clamp_limit_or_default};
use clarity_worker::{
    backfill, ingest, rehydrate, score, BackfillReport, BackfillWorker, IngestReport,
    IngestWorker, RefreshReport, RefreshWorker, RehydrateReport, RehydrateWorker, ScoreReport,
    ScoreWorker, SnapshotFetcher,
};

use crate::error::ApiError;
use crate::AppState;

const DIGEST_DEFAULT_LIMIT: u32 = 20;
const DIGEST_MAX_LIMIT: u32 = 50;
const OVERVIEW_DEFAULT_LIMIT: u32 = 50;
const OVERVIEW_MAX_LIMIT: u32 = 200;
const LEADERBOARD_DEFAULT_LIMIT: u32 = 100;
const LEADERBOARD_MAX_LIMIT: u32 = 200;
const LEADERBOARD_DEFAULT_MIN_STORIES: i64 = 3;

// --- Query structs ---

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
}

#[derive(Deserialize)]
pub struct OutletQuery {
    outlet: Option<String>,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    min_story_count: Option<String>,
    limit: Option<String>,
    sort: Option<String>,
}

// --- Batch workers ---

pub async fn score_worker(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<ScoreReport>, ApiError> {
    let store = state.news()?;
    let generator = state.generator()?;
    let limit = clamp_limit(params.limit.as_deref(), score::DEFAULT_LIMIT, score::MAX_LIMIT);

    let worker = ScoreWorker::new(
        store,
        generator,
        state.config.scoring_model.clone(),
        state.config.oversample_factor,
    );
    let report = worker
        .run(limit)
        .await
        .map_err(|e| ApiError::fatal(e, "NEWS_SCORE_FATAL"))?;
    Ok(Json(report))
}

pub async fn rehydrate_digest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<RehydrateReport>, ApiError> {
    let store = state.news()?;
    let generator = state.generator()?;
    let limit = clamp_limit_or_default(
        params.limit.as_deref(),
        rehydrate::DEFAULT_LIMIT,
        rehydrate::MAX_LIMIT,
    );

    let worker = RehydrateWorker::new(
        store,
        generator,
        state.fetcher.clone(),
        state.config.openai_model.clone(),
        state.config.oversample_factor,
    );
    let report = worker.run(limit).await.map_err(|e| {
        warn!(error = %e, "Rehydration failed");
        ApiError::internal(format!("{e:#}"))
    })?;
    Ok(Json(report))
}

pub async fn ingest_worker(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<IngestReport>, ApiError> {
    let store = state.news()?;
    let limit = clamp_limit(params.limit.as_deref(), ingest::DEFAULT_LIMIT, ingest::MAX_LIMIT);

    let mut snapshots = SnapshotFetcher::new(state.fetcher.clone());
    if let Some(rendered) = &state.rendered_fetcher {
        snapshots = snapshots.with_rendered(rendered.clone());
    }

    let worker = IngestWorker::new(
        store,
        snapshots,
        state.config.news_workspace_id.clone(),
        state.config.oversample_factor,
    );
    let report = worker
        .run(limit)
        .await
        .map_err(|e| ApiError::fatal(e, "NEWS_INGEST_FATAL"))?;
    Ok(Json(report))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshReport>, ApiError> {
    let store = state.news()?;
    let generator = state.generator()?;

    let worker = RefreshWorker::new(
        store,
        generator,
        state.searcher.clone(),
        state.config.openai_model.clone(),
        state.config.news_workspace_id.clone(),
    );
    let report = worker
        .run()
        .await
        .map_err(|e| ApiError::fatal(e, "NEWS_REFRESH_FATAL"))?;
    Ok(Json(report))
}

/// `GET /api/news/backfill-90d?days=90&outlet=npr.org&outlet=bbc.com`
pub async fn backfill_get(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<BackfillReport>, ApiError> {
    let mut days = backfill::DEFAULT_DAYS;
    let mut outlets = Vec::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "days" => {
                if let Some(n) = value.trim().parse::<f64>().ok().filter(|n| n.is_finite()) {
                    days = n.max(1.0) as u32;
                }
            }
            "outlet" if !value.is_empty() => outlets.push(value.into_owned()),
            _ => {}
        }
    }
    run_backfill(&state, days, outlets).await
}

/// `POST /api/news/backfill-90d` with an optional `{ "days": 90, "outlets": [..] }`
/// body. Unreadable bodies fall back to the defaults.
pub async fn backfill_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BackfillReport>, ApiError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let days = body["days"]
        .as_f64()
        .filter(|d| *d > 0.0)
        .map(|d| d.max(1.0) as u32)
        .unwrap_or(backfill::DEFAULT_DAYS);
    let outlets = body["outlets"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    run_backfill(&state, days, outlets).await
}

async fn run_backfill(
    state: &AppState,
    days: u32,
    outlets: Vec<String>,
) -> Result<Json<BackfillReport>, ApiError> {
    let store = state.news()?;
    let worker = BackfillWorker::new(store, state.searcher.clone());
    Ok(Json(worker.run(days, &outlets).await))
}

// --- Reads ---

/// Latest digest stories. Without a database this answers 200 with an
/// empty, `ok: false` payload so digest consumers degrade quietly.
pub async fn digest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let Some(store) = state.news.clone() else {
        warn!("Digest requested without a database");
        return Ok(Json(json!({
            "ok": false,
            "error": "Database not configured for news digest",
            "count": 0,
            "stories": [],
        })));
    };

    let limit = clamp_limit_or_default(
        params.limit.as_deref(),
        DIGEST_DEFAULT_LIMIT,
        DIGEST_MAX_LIMIT,
    );
    let stories = store
        .recent_digest_rows(i64::from(limit))
        .await
        .map_err(ApiError::store)?;

    Ok(Json(json!({
        "ok": true,
        "count": stories.len(),
        "stories": stories,
    })))
}

pub async fn outlet_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OutletQuery>,
) -> Result<Json<Value>, ApiError> {
    let outlet = params
        .outlet
        .filter(|o| !o.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing outlet parameter"))?;
    if outlet.contains('.') {
        return Err(ApiError::bad_request(
            "Invalid outlet identifier. Expected canonical_outlet.",
        ));
    }

    let overview = state
        .news()?
        .outlet_overview(&outlet)
        .await
        .map_err(ApiError::store)?;
    Ok(Json(json!({ "ok": true, "outlet": overview })))
}

pub async fn outlet_trends(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OutletQuery>,
) -> Result<Json<Value>, ApiError> {
    let outlet = params.outlet.filter(|o| !o.is_empty()).ok_or_else(|| {
        ApiError::bad_request("Missing 'outlet' parameter.").with_code("NO_OUTLET")
    })?;

    let points = state.news()?.outlet_trends(&outlet).await.map_err(|e| {
        warn!(outlet = %outlet, error = %e, "Outlet trends query failed");
        ApiError::internal("Failed to load outlet trends.")
    })?;

    Ok(Json(json!({
        "ok": true,
        "outlet": outlet,
        "count": points.len(),
        "points": points,
    })))
}

/// Per-outlet stats by canonical outlet in the path. Domain-style
/// identifiers answer 410 so stale clients stop retrying.
pub async fn outlet_stats_by_path(
    State(state): State<Arc<AppState>>,
    Path(outlet): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if outlet.is_empty() {
        return Err(ApiError::bad_request("Missing outlet parameter"));
    }
    if outlet.contains('.') {
        return Err(ApiError::new(
            StatusCode::GONE,
            "Legacy domain-based outlet route permanently removed",
        ));
    }

    let overview = state
        .news()?
        .outlet_overview(&outlet)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::not_found("Outlet not found for provided canonical_outlet"))?;
    Ok(Json(json!({ "ok": true, "outlet": overview })))
}

/// Per-outlet stats addressed by domain segments:
/// `/api/news/outlets/stats/reuters/com` looks up `reuters.com`. Answers the
/// bare overview row.
pub async fn outlet_stats_by_domain(
    State(state): State<Arc<AppState>>,
    Path(segments): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let domain = segments
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase();
    if domain.is_empty() {
        return Err(ApiError::bad_request("Missing outlet parameter"));
    }

    let overview = state
        .news()?
        .outlet_overview(&canonical_outlet(&domain))
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::not_found("Outlet not found"))?;
    Ok(Json(json!(overview)))
}

/// Every outlet's overview, most stories first.
pub async fn outlets_overview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = clamp_limit_or_default(
        params.limit.as_deref(),
        OVERVIEW_DEFAULT_LIMIT,
        OVERVIEW_MAX_LIMIT,
    );
    let outlets = state
        .news()?
        .outlet_overviews(i64::from(limit))
        .await
        .map_err(|e| {
            warn!(error = %e, "Outlet overview query failed");
            ApiError::internal("Failed to load outlet overview.")
        })?;

    Ok(Json(json!({
        "ok": true,
        "count": outlets.len(),
        "outlets": outlets,
    })))
}

/// Public outlet leaderboard over lifetime neutrality aggregates.
pub async fn outlet_neutrality(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Value>, ApiError> {
    let min_story_count = min_story_count(params.min_story_count.as_deref());
    let limit = clamp_limit(
        params.limit.as_deref(),
        LEADERBOARD_DEFAULT_LIMIT,
        LEADERBOARD_MAX_LIMIT,
    );
    let sort = OutletSort::parse(params.sort.as_deref());

    let rows = state
        .news()?
        .outlet_neutrality(min_story_count, sort, i64::from(limit))
        .await
        .map_err(|e| {
            warn!(error = %e, "Outlet neutrality query failed");
            ApiError::internal("Failed to load outlet neutrality aggregates.")
        })?;

    Ok(Json(json!({
        "ok": true,
        "min_story_count": min_story_count,
        "sort": sort.as_str(),
        "total": rows.len(),
        "rows": rows,
    })))
}

/// Floor of 1 when present; unparsable values also floor to 1.
fn min_story_count(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return LEADERBOARD_DEFAULT_MIN_STORIES;
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.ceil().max(1.0) as i64)
        .unwrap_or(1)
}
