use serde::{Deserialize, Serialize};

// =============================================================================
// Responses API
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponsesRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TextConfig {
    pub format: TextFormat,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TextFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl TextConfig {
    pub fn json_object() -> Self {
        Self {
            format: TextFormat {
                format_type: "json_object".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponsesResponse {
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutputItem {
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutputContent {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ResponsesResponse {
    /// The aggregated text output. Prefers the `output_text` convenience
    /// field, then joins every `output_text` content part.
    pub fn text(&self) -> Option<String> {
        if let Some(text) = self.output_text.as_ref().filter(|t| !t.is_empty()) {
            return Some(text.clone());
        }

        let joined: String = self
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|c| c.content_type == "output_text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}
