//! Per-page extraction: two sequential model calls.
//!
//! 1. **Raw text**: the page bytes plus [`RAW_TEXT_PROMPT`]; any text back.
//! 2. **Schema coercion**: the raw text embedded in the schema template,
//!    requesting `application/json`.
//!
//! The coercion reply is returned unparsed. Whether it is usable JSON is the
//! merger's concern, so a page that answers in prose still "succeeds" here.

use crate::config::ExtractionConfig;
use crate::document::PageUnit;
use crate::error::{ExtractionStage, PageError};
use crate::model::{GenerationRequest, GenerativeModel, ModelTask};
use crate::output::PageResult;
use crate::pipeline::llm::call_model;
use crate::prompts::{coercion_prompt, RAW_TEXT_PROMPT};
use crate::schema::Schema;
use std::time::Instant;
use tracing::debug;

/// Build the raw-text request for a page.
///
/// Textual pages (CSV, plain text) travel as a text part; everything else
/// is attached as media.
pub fn raw_text_request(page: &PageUnit, config: &ExtractionConfig) -> GenerationRequest {
    let request = GenerationRequest::new(ModelTask::RawText)
        .with_options(config)
        .text(RAW_TEXT_PROMPT);
    if page.media_type.is_text() {
        request.text(String::from_utf8_lossy(&page.content).into_owned())
    } else {
        request.media(page.media_type.mime(), page.content.clone())
    }
}

/// Build the schema-coercion request for a page's raw text.
pub fn coercion_request(schema: &Schema, raw_text: &str, config: &ExtractionConfig) -> GenerationRequest {
    GenerationRequest::new(ModelTask::SchemaCoercion)
        .with_options(config)
        .text(coercion_prompt(schema, raw_text))
        .json_output()
}

/// Extract one page.
///
/// Always returns a `PageResult`; a failed model call is recorded in
/// `result.error` so the caller can apply the page failure policy.
pub async fn extract_page(
    model: &dyn GenerativeModel,
    page: &PageUnit,
    schema: &Schema,
    config: &ExtractionConfig,
) -> PageResult {
    let start = Instant::now();
    let page_num = page.page_num();
    let label = format!("Page {}", page_num);

    let raw = match call_model(model, &raw_text_request(page, config), config, &label).await {
        Ok(reply) => reply,
        Err((e, retries)) => {
            return PageResult::failed(
                page_num,
                start.elapsed().as_millis() as u64,
                retries,
                PageError::ServiceFailed {
                    page: page_num,
                    stage: ExtractionStage::RawText,
                    detail: e.to_string(),
                },
            );
        }
    };
    debug!("{}: raw text {} chars", label, raw.text.len());

    let request = coercion_request(schema, &raw.text, config);
    match call_model(model, &request, config, &label).await {
        Ok(coerced) => PageResult {
            page_num,
            json: coerced.text,
            parsed: false,
            duration_ms: start.elapsed().as_millis() as u64,
            retries: raw.retries + coerced.retries,
            error: None,
        },
        Err((e, retries)) => PageResult::failed(
            page_num,
            start.elapsed().as_millis() as u64,
            raw.retries + retries,
            PageError::ServiceFailed {
                page: page_num,
                stage: ExtractionStage::SchemaCoercion,
                detail: e.to_string(),
            },
        ),
    }
}
