//! Configuration types for document extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct for every knob makes it
//! easy to share a config between concurrent page tasks and to log exactly
//! what a run was configured with.

use crate::error::DocExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use edgequake_docextract::{ExtractionConfig, PageFailurePolicy, VerificationMode};
///
/// let config = ExtractionConfig::builder()
///     .concurrency(4)
///     .verification(VerificationMode::Extraction)
///     .page_failure_policy(PageFailurePolicy::Abort)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription; low temperature keeps the model faithful
    /// to the page.
    pub temperature: f32,

    /// Output-token cap for every model call. Default: 8192.
    ///
    /// Dense statements with dozens of line items produce long JSON; a low
    /// cap truncates the object mid-array and it then fails to parse.
    pub max_output_tokens: usize,

    /// Maximum number of pages extracted at once. Default: 10.
    pub concurrency: usize,

    /// Retries per model call after the first attempt. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per model call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Longest edge of a rasterised PDF page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory holding a pdfium shared library. If None, the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Directory holding `<schema-id>.json` files. If None, only the embedded
    /// generic schema is available.
    pub schema_dir: Option<PathBuf>,

    /// What the post-merge verification pass checks. Default: [`VerificationMode::Math`].
    pub verification: VerificationMode,

    /// What a failed page does to the document. Default: [`PageFailurePolicy::Skip`].
    pub page_failure_policy: PageFailurePolicy,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_output_tokens: 8192,
            concurrency: 10,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            max_rendered_pixels: 2000,
            password: None,
            pdfium_lib_path: None,
            schema_dir: None,
            verification: VerificationMode::default(),
            page_failure_policy: PageFailurePolicy::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("schema_dir", &self.schema_dir)
            .field("verification", &self.verification)
            .field("page_failure_policy", &self.page_failure_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.schema_dir = Some(dir.into());
        self
    }

    pub fn verification(mut self, mode: VerificationMode) -> Self {
        self.config.verification = mode;
        self
    }

    pub fn page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.config.page_failure_policy = policy;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, DocExtractError> {
        let c = &self.config;
        if c.max_output_tokens == 0 {
            return Err(DocExtractError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the post-merge verification pass checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Arithmetic consistency: line items, subtotals, tax, totals, balances.
    #[default]
    Math,
    /// Extraction accuracy: missing fields, implausible values, misread text.
    Extraction,
}

impl VerificationMode {
    /// The document key the report is attached under.
    pub fn report_key(&self) -> &'static str {
        match self {
            VerificationMode::Math => "mathVerification",
            VerificationMode::Extraction => "extractionVerification",
        }
    }
}

impl FromStr for VerificationMode {
    type Err = DocExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(VerificationMode::Math),
            "extraction" => Ok(VerificationMode::Extraction),
            other => Err(DocExtractError::InvalidConfig(format!(
                "unknown verification mode '{other}' (expected math or extraction)"
            ))),
        }
    }
}

/// What happens to the document when one page's model calls fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Any failed page fails the whole document.
    Abort,
    /// Failed pages are left out of the merge; the document fails only when
    /// every page failed.
    #[default]
    Skip,
}
