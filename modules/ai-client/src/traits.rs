use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// Request
// =============================================================================

/// A single-prompt generation request. The input is always one string; there
/// is no message array or structured input.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub input: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub json_mode: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            max_output_tokens: None,
            temperature: None,
            json_mode: false,
        }
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Ask the provider for a JSON object response.
    pub fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

// =============================================================================
// Result
// =============================================================================

/// Outcome of a generation call. Failures carry their cause so callers can
/// tell "no answer" apart from "transport broke".
#[derive(Debug)]
pub enum Generation {
    Text(String),
    Empty,
    Failed(AiError),
}

impl Generation {
    /// Legacy placeholder text for callers that only want a string.
    pub const SENTINEL: &'static str = "[Model error]";

    pub fn text(&self) -> Option<&str> {
        match self {
            Generation::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn text_or_sentinel(&self) -> &str {
        self.text().unwrap_or(Self::SENTINEL)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Generation::Failed(_))
    }

    pub fn into_text(self) -> Result<String, AiError> {
        match self {
            Generation::Text(t) => Ok(t),
            Generation::Empty => Err(AiError::Empty),
            Generation::Failed(e) => Err(e),
        }
    }
}

// =============================================================================
// TextGenerator Trait
// =============================================================================

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the generated text. Never panics and never
    /// returns `Err`; every failure is folded into [`Generation::Failed`].
    async fn generate(&self, request: GenerationRequest) -> Generation;
}
