use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClarityError>;

#[derive(Error, Debug)]
pub enum ClarityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ClarityError {
    /// Missing or broken configuration. These surface as HTTP 500 and are
    /// never retried.
    pub fn is_config(&self) -> bool {
        matches!(self, ClarityError::Config(_))
    }
}

impl From<serde_json::Error> for ClarityError {
    fn from(e: serde_json::Error) -> Self {
        ClarityError::Parse(e.to_string())
    }
}
