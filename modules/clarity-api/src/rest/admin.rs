use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::rest::json_body;
use crate::AppState;

const SELFTEST_PLAINTEXT: &str = "hello";

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InitKeysBody {
    workspace_id: Option<String>,
}

pub async fn init_workspace_keys(
    State(state): State<Arc<AppState>>,
    body: Result<Json<InitKeysBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let workspace_id = json_body(body)?
        .workspace_id
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::bad_request("workspaceId required"))?;

    let key_ref = state
        .vault()?
        .init_workspace_key(&workspace_id)
        .await
        .map_err(|e| {
            error!(workspace_id = %workspace_id, error = %e, "Workspace key init failed");
            ApiError::internal(e.to_string())
        })?;

    info!(workspace_id = %workspace_id, "Workspace key ready");
    Ok(Json(json!({ "ok": true, "ref": key_ref })))
}

/// Encrypt then decrypt a fixed string with the diagnostic workspace key.
pub async fn crypto_selftest(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let vault = state.vault()?;
    let workspace_id = &state.config.diagnostic_workspace_id;

    let result = async {
        vault.init_workspace_key(workspace_id).await?;
        let encrypted = vault.encrypt(workspace_id, SELFTEST_PLAINTEXT).await?;
        let opened = vault.decrypt(workspace_id, &encrypted).await?;
        anyhow::Ok((encrypted, opened.plaintext))
    }
    .await;

    match result {
        Ok((encrypted, plaintext)) => Ok(Json(json!({
            "ok": plaintext == SELFTEST_PLAINTEXT,
            "encrypted": encrypted,
            "plaintext": plaintext,
        }))),
        Err(e) => {
            error!(error = %e, "Crypto self-test failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
