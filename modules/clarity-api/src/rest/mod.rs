pub mod admin;
pub mod memory;
pub mod news;
pub mod rolodex;
pub mod stripe;

use axum::{extract::rejection::JsonRejection, response::Json};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

// --- Helpers ---

/// Unwrap a JSON body, turning any rejection into a 400.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected request body");
            Err(ApiError::bad_request("Invalid JSON payload"))
        }
    }
}

pub fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid id"))
}

/// Field deserializer: strings pass through, any other JSON value reads as absent.
pub fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}
