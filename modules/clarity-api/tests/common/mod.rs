#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use clarity_api::{router, AppState};
use clarity_common::Config;
use clarity_store::testing::InMemoryStore;
use clarity_store::{KeyCache, Vault};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const STRIPE_SECRET: &str = "whsec_test";

pub fn config() -> Config {
    Config {
        supabase_jwt_secret: Some(JWT_SECRET.into()),
        stripe_webhook_secret: Some(STRIPE_SECRET.into()),
        ..Config::default()
    }
}

/// State with every persistence seam backed by `store`.
pub fn state_with(store: Arc<InMemoryStore>) -> AppState {
    let mut state = AppState::new(config());
    state.news = Some(store.clone());
    state.contacts = Some(store.clone());
    state.memories = Some(store.clone());
    state.subscriptions = Some(store.clone());
    state.vault = Some(Vault::new(Arc::new(KeyCache::new(store))));
    state
}

pub fn app(state: AppState) -> Router {
    router(Arc::new(state))
}

pub fn token_for(user_id: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "role": "authenticated",
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn authed(method: Method, uri: &str, user_id: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Status plus body, parsed as JSON when possible and as a string otherwise.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
