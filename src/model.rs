//! The remote generation seam.
//!
//! Every LLM interaction in the pipeline goes through [`GenerativeModel`]:
//! an ordered list of text and binary-media parts in, generated text out.
//! The pipeline never sees provider specifics. [`LlmModel`] adapts any
//! `edgequake_llm` provider to this trait; tests inject
//! [`crate::testing::MockModel`] instead.
//!
//! The model is constructed once and handed to the [`crate::Extractor`],
//! so there is no process-wide client or API key.

use crate::config::ExtractionConfig;
use crate::error::{DocExtractError, ServiceError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// What a generation call is for. Used for logging and by test doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTask {
    RawText,
    SchemaCoercion,
    Verification,
    VendorResearch,
}

impl fmt::Display for ModelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelTask::RawText => "raw_text",
            ModelTask::SchemaCoercion => "schema_coercion",
            ModelTask::Verification => "verification",
            ModelTask::VendorResearch => "vendor_research",
        };
        f.write_str(s)
    }
}

/// One ordered piece of a generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Media { mime_type: String, data: Vec<u8> },
}

/// A single call to the remote model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: ModelTask,
    pub parts: Vec<ContentPart>,
    pub max_output_tokens: usize,
    /// `Some("application/json")` when the caller needs a JSON object back.
    pub response_mime_type: Option<String>,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(task: ModelTask) -> Self {
        Self {
            task,
            parts: Vec::new(),
            max_output_tokens: 8192,
            response_mime_type: None,
            temperature: 0.1,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Text(text.into()));
        self
    }

    pub fn media(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.parts.push(ContentPart::Media {
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn json_output(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Apply the generation options from the extraction config.
    pub fn with_options(mut self, config: &ExtractionConfig) -> Self {
        self.max_output_tokens = config.max_output_tokens;
        self.temperature = config.temperature;
        self
    }

    pub fn wants_json(&self) -> bool {
        self.response_mime_type.as_deref() == Some("application/json")
    }

    /// All text parts joined with blank lines.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Media { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Borrow every media payload in order.
    pub fn media_parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::Media { mime_type, data } => Some((mime_type.as_str(), data.as_slice())),
            ContentPart::Text(_) => None,
        })
    }
}

/// A remote generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Human-readable backend identifier for logs.
    fn name(&self) -> &str;

    /// Run one generation call and return the generated text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

const JSON_ONLY_INSTRUCTION: &str = "Respond with a single valid JSON object only. \
Do not wrap it in markdown fences and do not add commentary.";

/// [`GenerativeModel`] backed by an `edgequake_llm` provider.
///
/// Images travel as base64 `ImageData`; textual media (CSV, plain text) is
/// decoded and inlined as text, since chat providers do not accept it as an
/// attachment.
pub struct LlmModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Resolve a provider from the config (see [`resolve_provider`]).
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, DocExtractError> {
        let provider = resolve_provider(config)?;
        let label = match (&config.provider_name, &config.model) {
            (Some(p), Some(m)) => format!("{p}/{m}"),
            (Some(p), None) => format!("{p}/{DEFAULT_MODEL}"),
            (None, Some(m)) => m.clone(),
            (None, None) => "auto".to_string(),
        };
        Ok(Self::new(provider, label))
    }

    fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if request.wants_json() {
            messages.push(ChatMessage::system(JSON_ONLY_INSTRUCTION));
        }

        let mut text = String::new();
        let mut images = Vec::new();
        for part in &request.parts {
            match part {
                ContentPart::Text(t) => push_paragraph(&mut text, t),
                ContentPart::Media { mime_type, data } if mime_type.starts_with("text/") => {
                    push_paragraph(&mut text, &String::from_utf8_lossy(data));
                }
                ContentPart::Media { mime_type, data } => {
                    images.push(ImageData::new(STANDARD.encode(data), mime_type.as_str()).with_detail("high"));
                }
            }
        }

        messages.push(ChatMessage::user_with_images(text, images));
        messages
    }
}

fn push_paragraph(buf: &mut String, text: &str) {
    if !buf.is_empty() {
        buf.push_str("\n\n");
    }
    buf.push_str(text);
}

#[async_trait]
impl GenerativeModel for LlmModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let messages = Self::build_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_output_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ServiceError::api(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            request.task, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(response.content)
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. Pre-built provider (`config.provider`).
/// 2. Named provider + model (`config.provider_name`).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set.
/// 4. OpenAI when `OPENAI_API_KEY` is present.
/// 5. `ProviderFactory::from_env()` auto-detection.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_parts_in_order() {
        let req = GenerationRequest::new(ModelTask::RawText)
            .text("first")
            .media("image/png", vec![1, 2, 3])
            .text("second");
        assert_eq!(req.prompt_text(), "first\n\nsecond");
        let media: Vec<_> = req.media_parts().collect();
        assert_eq!(media, vec![("image/png", &[1u8, 2, 3][..])]);
        assert!(!req.wants_json());
    }

    #[test]
    fn json_output_sets_mime() {
        let req = GenerationRequest::new(ModelTask::Verification).json_output();
        assert!(req.wants_json());
    }

    #[test]
    fn with_options_copies_generation_settings() {
        let config = ExtractionConfig::builder()
            .max_output_tokens(1024)
            .temperature(0.0)
            .build()
            .unwrap();
        let req = GenerationRequest::new(ModelTask::SchemaCoercion).with_options(&config);
        assert_eq!(req.max_output_tokens, 1024);
        assert_eq!(req.temperature, 0.0);
    }

    #[test]
    fn task_display_is_snake_case() {
        assert_eq!(ModelTask::SchemaCoercion.to_string(), "schema_coercion");
    }
}
