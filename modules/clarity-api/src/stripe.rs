//! Stripe webhook signature verification and subscription event mapping.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use clarity_store::SubscriptionRecord;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Unable to extract timestamp and signatures from header")]
    Malformed,

    #[error("Timestamp outside the tolerance zone")]
    Expired,

    #[error("No signatures found matching the expected signature for payload")]
    NoMatch,
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw payload. Any matching `v1` entry is accepted.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let expected = compute_signature(payload, secret, timestamp);
    if signatures
        .iter()
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::NoMatch)
    }
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`.
pub fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Header value Stripe would send for `payload` at `timestamp`.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!("t={timestamp},v1={}", compute_signature(payload, secret, timestamp))
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// Subscription row to upsert for `event`, or `None` for events we ignore.
pub fn subscription_record(event: &Event) -> Option<SubscriptionRecord> {
    let obj = &event.data.object;
    match event.kind.as_str() {
        "checkout.session.completed" => {
            if obj["mode"].as_str() != Some("subscription") {
                return None;
            }
            let subscription_id = id_of(&obj["subscription"])?;
            Some(SubscriptionRecord {
                stripe_subscription_id: subscription_id,
                stripe_customer_id: id_of(&obj["customer"]),
                user_id: text(&obj["client_reference_id"])
                    .or_else(|| text(&obj["metadata"]["user_id"])),
                workspace_id: text(&obj["metadata"]["workspace_id"]),
                status: "active".into(),
                last_event_type: Some(event.kind.clone()),
                ..Default::default()
            })
        }
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let subscription_id = text(&obj["id"])?;
            let status = text(&obj["status"]).unwrap_or_else(|| {
                if event.kind.ends_with("deleted") {
                    "canceled".into()
                } else {
                    "incomplete".into()
                }
            });
            Some(SubscriptionRecord {
                stripe_subscription_id: subscription_id,
                stripe_customer_id: id_of(&obj["customer"]),
                user_id: text(&obj["metadata"]["user_id"]),
                workspace_id: text(&obj["metadata"]["workspace_id"]),
                status,
                price_id: text(&obj["items"]["data"][0]["price"]["id"]),
                cancel_at_period_end: obj["cancel_at_period_end"].as_bool(),
                current_period_start: timestamp(&obj["current_period_start"]),
                current_period_end: timestamp(&obj["current_period_end"]),
                last_event_type: Some(event.kind.clone()),
            })
        }
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// An id that may arrive as a string or as an expanded object.
fn id_of(value: &Value) -> Option<String> {
    text(value).or_else(|| text(&value["id"]))
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_i64().and_then(|s| DateTime::from_timestamp(s, 0))
}
