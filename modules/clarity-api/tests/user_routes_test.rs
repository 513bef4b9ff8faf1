//! Authenticated rolodex and memory routes.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

use clarity_api::AppState;
use clarity_common::Config;
use clarity_store::testing::InMemoryStore;

use common::{app, authed, send, state_with, token_for};

fn store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let request = Request::builder().uri("/api/rolodex").body(Body::empty()).unwrap();
    let (status, body) = send(app(state_with(store())), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "ok": false, "error": "unauthenticated" }));
}

#[tokio::test]
async fn forged_token_is_unauthenticated() {
    let request = Request::builder()
        .uri("/api/memory")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(state_with(store())), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_token_is_accepted() {
    let request = Request::builder()
        .uri("/api/rolodex")
        .header(header::COOKIE, format!("sb-access-token={}", token_for("user-1")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(state_with(store())), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn missing_jwt_secret_is_server_error() {
    let mut state = AppState::new(Config::default());
    state.contacts = Some(store());
    let (status, body) = send(app(state), authed(Method::GET, "/api/rolodex", "user-1", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("SUPABASE_JWT_SECRET"));
}

// ---------------------------------------------------------------------------
// Rolodex
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rolodex_create_requires_name() {
    let request = authed(
        Method::POST,
        "/api/rolodex",
        "user-1",
        Some(json!({ "name": "  ", "notes": "x" })),
    );
    let (status, body) = send(app(state_with(store())), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn rolodex_lists_only_own_contacts() {
    let store = store();
    for (user, name) in [("user-1", "Ada"), ("user-2", "Grace")] {
        let request = authed(Method::POST, "/api/rolodex", user, Some(json!({ "name": name })));
        let (status, _) = send(app(state_with(store.clone())), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        app(state_with(store)),
        authed(Method::GET, "/api/rolodex", "user-1", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], "Ada");
}

#[tokio::test]
async fn rolodex_patch_rules() {
    let store = store();
    let request = authed(
        Method::POST,
        "/api/rolodex",
        "user-1",
        Some(json!({ "name": "Ada", "workspace_id": "ws-1" })),
    );
    let (_, created) = send(app(state_with(store.clone())), request).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/rolodex/{id}");

    // Empty patch.
    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-1", Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No updatable fields provided");

    // user_id alone is stripped, leaving nothing to update.
    let (status, _) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-1", Some(json!({ "user_id": "user-2" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Empty workspace clears it.
    let (status, body) = send(
        app(state_with(store.clone())),
        authed(
            Method::PATCH,
            &uri,
            "user-1",
            Some(json!({ "workspace_id": "", "notes": "met at conf", "user_id": "user-2" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["data"]["workspace_id"].is_null());
    assert_eq!(body["data"]["notes"], "met at conf");
    assert_eq!(body["data"]["user_id"], "user-1");

    // Someone else's contact.
    let (status, _) = send(
        app(state_with(store)),
        authed(Method::PATCH, &uri, "user-2", Some(json!({ "notes": "mine now" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rolodex_delete() {
    let store = store();
    let (_, created) = send(
        app(state_with(store.clone())),
        authed(Method::POST, "/api/rolodex", "user-1", Some(json!({ "name": "Ada" }))),
    )
    .await;
    let uri = format!("/api/rolodex/{}", created["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::DELETE, &uri, "user-1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    assert!(store.contacts().is_empty());
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let (status, body) = send(
        app(state_with(store())),
        authed(Method::DELETE, "/api/rolodex/not-a-uuid", "user-1", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid id");
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_create_validates_in_order() {
    let cases = [
        (json!({ "memory_type": "fact", "content": "x" }), "workspace_id is required"),
        (
            json!({ "workspace_id": "ws", "memory_type": "dream", "content": "x" }),
            "Invalid memory_type. Allowed: fact, episodic, autobiographical",
        ),
        (
            json!({ "workspace_id": "ws", "memory_type": "fact", "content": "   " }),
            "content is required",
        ),
        (
            json!({ "workspace_id": "ws", "memory_type": "fact", "content": 42 }),
            "content is required",
        ),
        (
            json!({ "workspace_id": "ws", "memory_type": "fact", "content": { "text": "x" } }),
            "content is required",
        ),
        (
            json!({ "workspace_id": 7, "memory_type": "fact", "content": "x" }),
            "workspace_id is required",
        ),
    ];
    for (payload, message) in cases {
        let (status, body) = send(
            app(state_with(store())),
            authed(Method::POST, "/api/memory", "user-1", Some(payload)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], message);
    }
}

#[tokio::test]
async fn memory_create_returns_201_with_row() {
    let store = store();
    let (status, body) = send(
        app(state_with(store.clone())),
        authed(
            Method::POST,
            "/api/memory",
            "user-1",
            Some(json!({ "workspace_id": "ws", "memory_type": "episodic", "content": "Visited Oslo" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["memory_type"], "episodic");
    assert_eq!(body["source"], "explicit");
    assert_eq!(body["user_id"], "user-1");
    assert_eq!(store.memories().len(), 1);
}

#[tokio::test]
async fn memory_update_and_delete_respect_ownership() {
    let store = store();
    let (_, created) = send(
        app(state_with(store.clone())),
        authed(
            Method::POST,
            "/api/memory",
            "user-1",
            Some(json!({ "workspace_id": "ws", "memory_type": "fact", "content": "Likes tea" })),
        ),
    )
    .await;
    let uri = format!("/api/memory/{}", created["id"].as_str().unwrap());

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-1", Some(json!({ "content": "" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "content is required");

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-1", Some(json!({ "content": ["a"] }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "content is required");

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-2", Some(json!({ "content": "Likes coffee" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Memory not found or not owned by user");

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::PATCH, &uri, "user-1", Some(json!({ "content": "Likes coffee" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "Likes coffee");

    let (status, body) = send(
        app(state_with(store.clone())),
        authed(Method::DELETE, &uri, "user-1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "success": true }));

    let (status, _) = send(
        app(state_with(store)),
        authed(Method::DELETE, &uri, "user-1", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn memory_list_filters_by_workspace() {
    let store = store();
    for ws in ["ws-a", "ws-b"] {
        send(
            app(state_with(store.clone())),
            authed(
                Method::POST,
                "/api/memory",
                "user-1",
                Some(json!({ "workspace_id": ws, "memory_type": "fact", "content": ws })),
            ),
        )
        .await;
    }

    let (status, body) = send(
        app(state_with(store)),
        authed(Method::GET, "/api/memory?workspace_id=ws-b", "user-1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["content"], "ws-b");
}
