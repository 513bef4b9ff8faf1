mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::AiError;
use crate::traits::{Generation, GenerationRequest, TextGenerator};

use client::{OpenAiClient, OPENAI_API_URL};
use types::{ResponsesRequest, TextConfig};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// OpenAi
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AiError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the default model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        OpenAiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
            self.timeout,
        )
    }

    fn wire_request(&self, request: &GenerationRequest) -> ResponsesRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        ResponsesRequest {
            model,
            input: request.input.clone(),
            max_output_tokens: request.max_output_tokens,
            temperature: request.temperature,
            text: request.json_mode.then(TextConfig::json_object),
        }
    }

    /// Call the Responses API and return the output text, if any.
    pub async fn respond(&self, request: &GenerationRequest) -> Result<Option<String>, AiError> {
        let wire = self.wire_request(request);
        let response = self.client().responses(&wire).await?;
        Ok(response.text())
    }
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(&self, request: GenerationRequest) -> Generation {
        match self.respond(&request).await {
            Ok(Some(text)) if !text.trim().is_empty() => Generation::Text(text),
            Ok(_) => Generation::Empty,
            Err(e) => {
                warn!(model = %request.model, error = %e, "Model generation failed");
                Generation::Failed(e)
            }
        }
    }
}
