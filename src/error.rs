//! Error types for the edgequake-docextract library.
//!
//! Three tiers reflect three distinct failure modes:
//!
//! * [`DocExtractError`] is **fatal**: the request cannot produce a document
//!   (unreadable input, corrupt PDF, provider not configured). Returned as
//!   `Err(DocExtractError)` from the [`crate::Extractor`] entry points.
//!
//! * [`PageError`] is **non-fatal**: one page's model calls failed. Stored in
//!   [`crate::output::PageResult`]; whether it aborts the document depends on
//!   [`crate::config::PageFailurePolicy`].
//!
//! * [`ServiceError`] / [`MalformedResponse`] are raised by a single model call.
//!   The extractor and verifier convert these into degraded results at their
//!   boundary; they never reach the caller directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docextract library.
#[derive(Debug, Error)]
pub enum DocExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The uploaded document could not be parsed (corrupt PDF, truncated file).
    #[error("Document '{name}' could not be parsed: {detail}")]
    DocumentFormat { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("Document '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for document '{name}'")]
    WrongPassword { name: String },

    /// The document parsed but contains no pages.
    #[error("Document '{name}' contains no pages")]
    EmptyDocument { name: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A page failed and the failure policy is [`crate::config::PageFailurePolicy::Abort`].
    #[error("Extraction aborted: {0}")]
    PageFailed(PageError),

    /// Every page failed; there is nothing to merge.
    #[error("All {total} pages failed to extract.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium for your platform, or set PDFIUM_LIB_PATH to the directory\n\
containing libpdfium (pdfium.dll on Windows).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single remote model call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport, quota or provider error reported by the model backend.
    #[error("model API error: {message}")]
    Api { message: String },

    /// The call did not complete within the configured timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend answered with no content at all.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Api`].
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

/// The model returned text where a JSON object was required.
///
/// The raw text is retained so callers can surface it for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("model returned malformed JSON: {detail}")]
pub struct MalformedResponse {
    pub detail: String,
    pub raw: String,
}

/// Which of the two per-page calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStage {
    RawText,
    SchemaCoercion,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStage::RawText => f.write_str("raw-text extraction"),
            ExtractionStage::SchemaCoercion => f.write_str("schema coercion"),
        }
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageError {
    /// One of the page's model calls failed after all retries.
    #[error("Page {page}: {stage} failed: {detail}")]
    ServiceFailed {
        page: usize,
        stage: ExtractionStage,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ServiceFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_failed_display_names_stage() {
        let e = DocExtractError::PageFailed(PageError::ServiceFailed {
            page: 2,
            stage: ExtractionStage::SchemaCoercion,
            detail: "quota exceeded".into(),
        });
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("schema coercion"), "got: {msg}");
        assert!(msg.contains("quota exceeded"), "got: {msg}");
    }

    #[test]
    fn all_pages_failed_display() {
        let e = DocExtractError::AllPagesFailed {
            total: 3,
            first_error: "timeout".into(),
        };
        assert!(e.to_string().contains("All 3 pages"));
    }

    #[test]
    fn service_timeout_display() {
        let e = ServiceError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn page_error_serialises_stage_snake_case() {
        let e = PageError::ServiceFailed {
            page: 1,
            stage: ExtractionStage::RawText,
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"raw_text\""), "got: {json}");
        assert_eq!(e.page(), 1);
    }
}
