//! Stripe webhook and workspace key admin routes.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};

use clarity_api::stripe::signature_header;
use clarity_api::AppState;
use clarity_store::testing::InMemoryStore;

use common::{app, config, get, post_json, send, state_with, STRIPE_SECRET};

fn webhook_request(payload: &Value, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/stripe/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn signed(payload: &Value) -> String {
    signature_header(
        payload.to_string().as_bytes(),
        STRIPE_SECRET,
        chrono::Utc::now().timestamp(),
    )
}

fn subscription_event(kind: &str, status: &str) -> Value {
    json!({
        "id": "evt_1",
        "type": kind,
        "data": { "object": {
            "id": "sub_1",
            "customer": "cus_1",
            "status": status,
            "metadata": { "user_id": "user-1" },
            "items": { "data": [ { "price": { "id": "price_pro" } } ] }
        }}
    })
}

// ---------------------------------------------------------------------------
// Stripe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_get_ping() {
    let (status, body) = send(app(AppState::new(config())), get("/api/stripe/webhook")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn webhook_requires_signature() {
    let payload = subscription_event("customer.subscription.created", "active");
    let (status, body) = send(
        app(state_with(Arc::new(InMemoryStore::new()))),
        webhook_request(&payload, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing signature");
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let store = Arc::new(InMemoryStore::new());
    let payload = subscription_event("customer.subscription.created", "active");
    let forged = signature_header(b"something else", STRIPE_SECRET, chrono::Utc::now().timestamp());

    let (status, body) = send(app(state_with(store.clone())), webhook_request(&payload, Some(forged))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    assert!(store.subscription("sub_1").is_none());
}

#[tokio::test]
async fn webhook_upserts_subscription_state() {
    let store = Arc::new(InMemoryStore::new());

    let created = subscription_event("customer.subscription.created", "active");
    let (status, body) = send(
        app(state_with(store.clone())),
        webhook_request(&created, Some(signed(&created))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let deleted = subscription_event("customer.subscription.deleted", "canceled");
    send(
        app(state_with(store.clone())),
        webhook_request(&deleted, Some(signed(&deleted))),
    )
    .await;

    let record = store.subscription("sub_1").unwrap();
    assert_eq!(record.status, "canceled");
    assert_eq!(record.price_id.as_deref(), Some("price_pro"));
    assert_eq!(record.user_id.as_deref(), Some("user-1"));
    assert_eq!(
        record.last_event_type.as_deref(),
        Some("customer.subscription.deleted")
    );
}

#[tokio::test]
async fn webhook_acknowledges_untracked_events() {
    let store = Arc::new(InMemoryStore::new());
    let payload = json!({ "type": "invoice.paid", "data": { "object": { "id": "in_1" } } });

    let (status, _) = send(
        app(state_with(store.clone())),
        webhook_request(&payload, Some(signed(&payload))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(store.subscription("in_1").is_none());
}

#[tokio::test]
async fn webhook_without_secret_is_server_error() {
    let mut state = AppState::new(clarity_common::Config::default());
    state.subscriptions = Some(Arc::new(InMemoryStore::new()));
    let payload = subscription_event("customer.subscription.created", "active");

    let (status, _) = send(app(state), webhook_request(&payload, Some(signed(&payload)))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn init_workspace_keys_requires_workspace() {
    let (status, body) = send(
        app(state_with(Arc::new(InMemoryStore::new()))),
        post_json("/api/admin/init-workspace-keys", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "workspaceId required");
}

#[tokio::test]
async fn init_workspace_keys_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let state = Arc::new(state_with(store.clone()));
    let router = clarity_api::router(state);

    for _ in 0..2 {
        let (status, body) = send(
            router.clone(),
            post_json("/api/admin/init-workspace-keys", json!({ "workspaceId": "ws-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "ok": true, "ref": { "workspaceId": "ws-1", "keyBytes": 32, "alg": "AES-256-GCM" } })
        );
    }
    // Second call is served from the key cache.
    assert_eq!(store.key_reads(), 1);
}

#[tokio::test]
async fn crypto_selftest_round_trips() {
    let (status, body) = send(
        app(state_with(Arc::new(InMemoryStore::new()))),
        get("/api/admin/crypto-selftest"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["plaintext"], "hello");
    assert!(body["encrypted"].as_str().unwrap().starts_with("enc:v1:"));
}

#[tokio::test]
async fn admin_routes_need_database() {
    let (status, body) = send(app(AppState::new(config())), get("/api/admin/crypto-selftest")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "NO_DATABASE");
}
