//! Extraction entry points.
//!
//! [`Extractor`] drives the whole pipeline for one document: split, extract
//! every page concurrently, merge, verify. It owns its model handle, config
//! and schema registry, so several extractors with different backends can
//! live side by side.

use crate::config::{ExtractionConfig, PageFailurePolicy};
use crate::document::{PageUnit, SourceDocument};
use crate::error::DocExtractError;
use crate::model::{GenerativeModel, LlmModel};
use crate::output::{DocumentBody, ExtractionOutput, ExtractionStats, PageResult};
use crate::pipeline::{classify, extract, input, merge, response, split, verify};
use crate::schema::{Schema, SchemaRegistry};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The document extraction pipeline.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docextract::{ExtractionConfig, Extractor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = Extractor::from_config(ExtractionConfig::default())?;
/// let output = extractor.process("statement.pdf", None).await?;
/// println!("{}", output.response_text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn GenerativeModel>,
    config: ExtractionConfig,
    schemas: SchemaRegistry,
}

impl Extractor {
    /// Build an extractor around an injected model.
    pub fn new(model: Arc<dyn GenerativeModel>, config: ExtractionConfig) -> Self {
        let schemas = SchemaRegistry::new(config.schema_dir.clone());
        Self {
            model,
            config,
            schemas,
        }
    }

    /// Build an extractor whose model is resolved from the config's provider settings.
    pub fn from_config(config: ExtractionConfig) -> Result<Self, DocExtractError> {
        let model = LlmModel::from_config(&config)?;
        info!("Using model backend: {}", model.name());
        Ok(Self::new(Arc::new(model), config))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    /// Extract a local file or HTTP/HTTPS URL.
    ///
    /// # Errors
    /// Returns `Err` only for fatal errors: unreadable input, a document that
    /// cannot be split, a failed page under [`PageFailurePolicy::Abort`], or
    /// every page failing under [`PageFailurePolicy::Skip`].
    pub async fn process(
        &self,
        input_str: impl AsRef<str>,
        schema_name: Option<&str>,
    ) -> Result<ExtractionOutput, DocExtractError> {
        let input_str = input_str.as_ref();
        info!("Starting extraction: {}", input_str);
        let doc = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.process_document(&doc, schema_name).await
    }

    /// Extract an in-memory upload; the media type is detected from name and content.
    pub async fn process_bytes(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        schema_name: Option<&str>,
    ) -> Result<ExtractionOutput, DocExtractError> {
        let doc = SourceDocument::new(name, bytes);
        self.process_document(&doc, schema_name).await
    }

    /// Split and extract a source document.
    pub async fn process_document(
        &self,
        doc: &SourceDocument,
        schema_name: Option<&str>,
    ) -> Result<ExtractionOutput, DocExtractError> {
        let total_start = Instant::now();

        let split_start = Instant::now();
        let pages = split::split_document(doc, &self.config).await?;
        let split_duration_ms = split_start.elapsed().as_millis() as u64;
        info!(
            "Split '{}' into {} page unit(s) in {}ms",
            doc.name,
            pages.len(),
            split_duration_ms
        );

        let schema = self.schemas.load(schema_name).await;
        let mut output = self.run(pages, &schema).await?;
        output.stats.split_duration_ms = split_duration_ms;
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(output)
    }

    /// Extract pages the caller has already split.
    pub async fn process_pages(
        &self,
        pages: Vec<PageUnit>,
        schema_name: Option<&str>,
    ) -> Result<ExtractionOutput, DocExtractError> {
        let total_start = Instant::now();
        let schema = self.schemas.load(schema_name).await;
        let mut output = self.run(pages, &schema).await?;
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(output)
    }

    async fn run(
        &self,
        pages: Vec<PageUnit>,
        schema: &Schema,
    ) -> Result<ExtractionOutput, DocExtractError> {
        let total_pages = pages.len();
        if total_pages == 0 {
            return Err(DocExtractError::EmptyDocument {
                name: "<pages>".to_string(),
            });
        }
        debug!("Extracting {} pages with schema '{}'", total_pages, schema.id);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_start(total_pages);
        }

        // ── Extract pages ────────────────────────────────────────────────
        let extract_start = Instant::now();
        let mut results = self.extract_all(pages, schema).await?;
        let extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

        let extracted = results.iter().filter(|p| p.is_success()).count();
        let failed = total_pages - extracted;

        if extracted == 0 {
            let first_error = results
                .iter()
                .find_map(|p| p.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_extraction_complete(total_pages, 0);
            }
            return Err(DocExtractError::AllPagesFailed {
                total: total_pages,
                first_error,
            });
        }

        // ── Merge ────────────────────────────────────────────────────────
        for page in results.iter_mut().filter(|p| p.is_success()) {
            page.parsed = response::parse_object(&page.json).is_ok();
            if !page.parsed {
                warn!("Page {}: output is not a JSON object, excluded from merge", page.page_num);
            }
        }
        let unparsed = results.iter().filter(|p| p.is_success() && !p.parsed).count();
        let texts: Vec<&str> = results
            .iter()
            .filter(|p| p.is_success())
            .map(|p| p.json.as_str())
            .collect();
        let merged = merge::merge_pages(&texts);

        // ── Verify ───────────────────────────────────────────────────────
        let verify_start = Instant::now();
        let (body, report, document_type) = match merged {
            Some(doc) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_verification_start(classify::classify(&doc).as_str());
                }
                let (doc, report, doc_type) =
                    verify::verify_document(self.model.as_ref(), doc, &self.config).await;
                (DocumentBody::Structured(doc), Some(report), Some(doc_type))
            }
            None => {
                warn!("No page produced a JSON object; returning raw page text unverified");
                let raw = texts
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                (DocumentBody::Raw(raw), None, None)
            }
        };
        let verification_duration_ms = verify_start.elapsed().as_millis() as u64;

        let stats = ExtractionStats {
            total_pages,
            extracted_pages: extracted,
            failed_pages: failed,
            unparsed_pages: unparsed,
            split_duration_ms: 0,
            extraction_duration_ms,
            verification_duration_ms,
            total_duration_ms: 0,
        };

        info!(
            "Extraction complete: {}/{} pages extracted, {} unparsed, {}ms in model calls",
            extracted, total_pages, unparsed, extraction_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_complete(total_pages, extracted);
        }

        Ok(ExtractionOutput {
            body,
            schema: schema.id,
            document_type,
            report,
            pages: results,
            stats,
        })
    }

    /// Extract every page concurrently, results in page order.
    ///
    /// Under [`PageFailurePolicy::Abort`] the first failure (in page order)
    /// ends the run; pages still in flight are dropped.
    async fn extract_all(
        &self,
        pages: Vec<PageUnit>,
        schema: &Schema,
    ) -> Result<Vec<PageResult>, DocExtractError> {
        let total_pages = pages.len();
        let concurrency = self.config.concurrency.max(1);

        let mut stream = stream::iter(pages.into_iter().map(|page| {
            let model = Arc::clone(&self.model);
            let config = &self.config;
            async move {
                let page_num = page.page_num();
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_start(page_num, total_pages);
                }
                let result = extract::extract_page(model.as_ref(), &page, schema, config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result.error {
                        None => cb.on_page_complete(page_num, total_pages, result.json.len()),
                        Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                    }
                }
                result
            }
        }))
        .buffered(concurrency);

        let mut results = Vec::with_capacity(total_pages);
        while let Some(result) = stream.next().await {
            if let Some(ref e) = result.error {
                match self.config.page_failure_policy {
                    PageFailurePolicy::Abort => {
                        warn!("{}; aborting document", e);
                        return Err(DocExtractError::PageFailed(e.clone()));
                    }
                    PageFailurePolicy::Skip => warn!("{}; skipping page", e),
                }
            }
            results.push(result);
        }
        Ok(results)
    }
}
