//! # edgequake-docextract
//!
//! Extract structured JSON from financial documents (invoices, receipts,
//! bank and payment-processing statements, tax forms) using LLMs.
//!
//! ## Why this crate?
//!
//! A single prompt over a whole statement loses rows: long tables overflow
//! the output budget and the model summarises instead of transcribing. This
//! crate splits a PDF into page images, transcribes each page faithfully,
//! coerces each transcription into a target schema, deep-merges the pages
//! back into one document and finally asks the model to check the numbers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (PDF / image / CSV / text)
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Split    one PNG per PDF page via pdfium (spawn_blocking)
//!  ├─ 3. Extract  per page, concurrently: raw text → schema JSON
//!  ├─ 4. Merge    deep merge in page order, first value wins
//!  ├─ 5. Verify   classify, one checking call, capped discrepancy report
//!  └─ 6. Output   merged JSON + report + per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let extractor = Extractor::from_config(ExtractionConfig::default())?;
//!     let output = extractor.process("statement.pdf", Some("generic")).await?;
//!     println!("{}", output.response_text());
//!     if let Some(report) = &output.report {
//!         eprintln!("verified: {} ({} discrepancies)", report.verified, report.discrepancies.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod research;
pub mod schema;
pub mod service;
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageFailurePolicy, VerificationMode};
pub use document::{MediaType, PageUnit, SourceDocument};
pub use error::{DocExtractError, MalformedResponse, PageError, ServiceError};
pub use extract::Extractor;
pub use model::{ContentPart, GenerationRequest, GenerativeModel, LlmModel, ModelTask};
pub use output::{
    Discrepancy, DocumentBody, ExtractionOutput, ExtractionStats, PageResult, Significance,
    VerificationReport,
};
pub use pipeline::classify::DocumentType;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{Schema, SchemaId, SchemaRegistry};
pub use service::{ApiResponse, DocumentService, RequestError};
