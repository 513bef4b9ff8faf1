use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use clarity_store::{Memory, MemoryType, NewMemory};
use clarity_worker::batch::clamp_limit_or_default;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::rest::{json_body, parse_id, string_or_none};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;
const NOT_OWNED: &str = "Memory not found or not owned by user";

#[derive(Deserialize)]
pub struct ListQuery {
    workspace_id: Option<String>,
    limit: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateMemoryBody {
    #[serde(deserialize_with = "string_or_none")]
    workspace_id: Option<String>,
    #[serde(deserialize_with = "string_or_none")]
    memory_type: Option<String>,
    #[serde(deserialize_with = "string_or_none")]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct UpdateMemoryBody {
    #[serde(deserialize_with = "string_or_none")]
    content: Option<String>,
}

pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = clamp_limit_or_default(params.limit.as_deref(), DEFAULT_LIMIT, MAX_LIMIT);
    let workspace = params.workspace_id.as_deref().filter(|w| !w.is_empty());

    let memories = state
        .memories()?
        .list_memories(&user.user_id, workspace, i64::from(limit))
        .await
        .map_err(ApiError::store)?;
    Ok(Json(json!({ "ok": true, "data": memories })))
}

/// Explicit, user-authored memory. Validation order matters to clients:
/// workspace, then type, then content.
pub async fn create_memory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<CreateMemoryBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Memory>), ApiError> {
    let body = json_body(body)?;

    let workspace_id = body
        .workspace_id
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::bad_request("workspace_id is required"))?;
    let memory_type = body
        .memory_type
        .as_deref()
        .and_then(|t| t.parse::<MemoryType>().ok())
        .ok_or_else(|| {
            ApiError::bad_request("Invalid memory_type. Allowed: fact, episodic, autobiographical")
        })?;
    let content = body
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("content is required"))?;

    let memory = NewMemory {
        workspace_id,
        memory_type,
        content,
    };
    let created = state
        .memories()?
        .create_memory(&user.user_id, &memory)
        .await
        .map_err(ApiError::store)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_memory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateMemoryBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let content = json_body(body)?
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("content is required"))?;

    let updated = state
        .memories()?
        .update_memory_content(id, &user.user_id, &content)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::not_found(NOT_OWNED))?;
    Ok(Json(json!({ "ok": true, "data": updated })))
}

pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .memories()?
        .delete_memory(id, &user.user_id)
        .await
        .map_err(ApiError::store)?;
    if !deleted {
        return Err(ApiError::not_found(NOT_OWNED));
    }
    Ok(Json(json!({ "ok": true, "success": true })))
}
