use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::stripe::{subscription_record, verify_signature, Event};
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verify the signature over the raw body, then upsert subscription state
/// for the events we track. Other event types are acknowledged and dropped.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing signature"))?;
    let secret = state.config.require_stripe_secret()?;

    let now = chrono::Utc::now().timestamp();
    verify_signature(&payload, signature, secret, now).map_err(|e| {
        warn!(error = %e, "Stripe signature rejected");
        ApiError::bad_request(format!("Webhook Error: {e}"))
    })?;

    let event: Event = serde_json::from_slice(&payload)
        .map_err(|e| ApiError::bad_request(format!("Webhook Error: {e}")))?;

    match subscription_record(&event) {
        Some(record) => {
            state
                .subscriptions()?
                .upsert_subscription(&record)
                .await
                .map_err(ApiError::store)?;
            info!(
                event = %event.kind,
                subscription = %record.stripe_subscription_id,
                status = %record.status,
                "Subscription updated"
            );
        }
        None => info!(event = %event.kind, "Stripe event ignored"),
    }

    Ok(Json(json!({ "ok": true })))
}

/// Stripe occasionally checks the endpoint with GET.
pub async fn webhook_ping() -> &'static str {
    "OK"
}
