use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use clarity_store::{ContactPatch, NewContact};
use clarity_worker::batch::clamp_limit_or_default;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::rest::{json_body, parse_id};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Deserialize)]
pub struct ListQuery {
    workspace_id: Option<String>,
    limit: Option<String>,
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = clamp_limit_or_default(params.limit.as_deref(), DEFAULT_LIMIT, MAX_LIMIT);
    let workspace = params.workspace_id.as_deref().filter(|w| !w.is_empty());

    let contacts = state
        .contacts()?
        .list_contacts(&user.user_id, workspace, i64::from(limit))
        .await
        .map_err(ApiError::store)?;
    Ok(Json(json!({ "ok": true, "data": contacts })))
}

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<NewContact>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let contact = json_body(body)?.normalized();
    if contact.name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let created = state
        .contacts()?
        .create_contact(&user.user_id, &contact)
        .await
        .map_err(ApiError::store)?;
    Ok(Json(json!({ "ok": true, "data": created })))
}

/// Partial update. `user_id` in the body is ignored; ownership comes from
/// the token.
pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<ContactPatch>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let patch = json_body(body)?.normalized();
    if patch.is_empty() {
        return Err(ApiError::bad_request("No updatable fields provided"));
    }
    if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::bad_request("name cannot be empty"));
    }

    let updated = state
        .contacts()?
        .update_contact(id, &user.user_id, &patch)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::not_found("Contact not found or not owned by user"))?;
    Ok(Json(json!({ "ok": true, "data": updated })))
}

pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    state
        .contacts()?
        .delete_contact(id, &user.user_id)
        .await
        .map_err(ApiError::store)?;
    Ok(Json(json!({ "ok": true })))
}
