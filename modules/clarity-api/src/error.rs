use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use clarity_common::ClarityError;

/// Error response with body `{ ok: false, error, code? }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn no_database() -> Self {
        Self::internal("Database not configured on server (missing DATABASE_URL).")
            .with_code("NO_DATABASE")
    }

    /// A batch run that failed as a whole.
    pub fn fatal(e: anyhow::Error, code: &'static str) -> Self {
        error!(code, error = %e, "Batch run failed");
        Self::internal(format!("{e:#}")).with_code(code)
    }

    /// A store call that failed inside a request.
    pub fn store(e: anyhow::Error) -> Self {
        error!(error = %e, "Store call failed");
        Self::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "ok": false, "error": self.message });
        if let Some(code) = self.code {
            body["code"] = json!(code);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<ClarityError> for ApiError {
    fn from(e: ClarityError) -> Self {
        let status = match &e {
            ClarityError::Validation(_) | ClarityError::Parse(_) => StatusCode::BAD_REQUEST,
            ClarityError::NotFound(_) => StatusCode::NOT_FOUND,
            ClarityError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if e.is_config() {
            error!(error = %e, "Configuration error");
        }
        Self::new(status, e.to_string())
    }
}
