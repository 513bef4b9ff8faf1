pub mod auth;
pub mod error;
pub mod rest;
pub mod state;
pub mod stripe;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::ApiError;
pub use state::AppState;

use rest::{admin, memory, news, rolodex};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Health check
        .route("/health", get(|| async { "ok" }))
        // News batch workers (GET and POST are equivalent)
        .route(
            "/api/news/score-worker",
            get(news::score_worker).post(news::score_worker),
        )
        .route(
            "/api/news/rehydrate-digest",
            get(news::rehydrate_digest).post(news::rehydrate_digest),
        )
        .route(
            "/api/news/ingest-worker",
            get(news::ingest_worker).post(news::ingest_worker),
        )
        .route("/api/news/refresh", get(news::refresh).post(news::refresh))
        .route(
            "/api/news/backfill-90d",
            get(news::backfill_get).post(news::backfill_post),
        )
        // News reads
        .route("/api/news/digest", get(news::digest))
        .route("/api/news/outlet-stats", get(news::outlet_stats))
        .route("/api/news/outlets/trends", get(news::outlet_trends))
        .route("/api/news/outlets/overview", get(news::outlets_overview))
        .route(
            "/api/news/outlets/{outlet}/stats",
            get(news::outlet_stats_by_path),
        )
        .route(
            "/api/news/outlets/stats/{*outlet}",
            get(news::outlet_stats_by_domain),
        )
        .route(
            "/api/public/outlet-neutrality",
            get(news::outlet_neutrality).post(news::outlet_neutrality),
        )
        // Rolodex
        .route(
            "/api/rolodex",
            get(rolodex::list_contacts).post(rolodex::create_contact),
        )
        .route(
            "/api/rolodex/{id}",
            patch(rolodex::update_contact).delete(rolodex::delete_contact),
        )
        // Memory
        .route(
            "/api/memory",
            get(memory::list_memories).post(memory::create_memory),
        )
        .route(
            "/api/memory/{id}",
            patch(memory::update_memory).delete(memory::delete_memory),
        )
        // Billing
        .route(
            "/api/stripe/webhook",
            post(rest::stripe::webhook).get(rest::stripe::webhook_ping),
        )
        // Admin
        .route(
            "/api/admin/init-workspace-keys",
            post(admin::init_workspace_keys),
        )
        .route("/api/admin/crypto-selftest", get(admin::crypto_selftest))
        .with_state(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only (no query params)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

/// Any origin when the list is empty, else exactly the listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
