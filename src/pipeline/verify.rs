//! Post-merge verification.
//!
//! One model call checks the merged document, arithmetic or extraction
//! accuracy depending on [`VerificationMode`], with emphasis chosen by the
//! classified [`DocumentType`]. The verifier never fails: a remote error or
//! an unparseable reply becomes an unverified report, and the document is
//! returned either way.

use crate::config::ExtractionConfig;
use crate::model::{GenerationRequest, GenerativeModel, ModelTask};
use crate::output::{Discrepancy, Significance, VerificationReport};
use crate::pipeline::classify::{classify, DocumentType};
use crate::pipeline::llm::call_model;
use crate::pipeline::response::parse_typed;
use crate::prompts::verification_prompt;
use serde_json::Value;
use tracing::{info, warn};

/// Above this many discrepancies, Low ones are dropped.
pub const DISCREPANCY_SOFT_CAP: usize = 10;
/// Above this many, only High ones are kept (or the first Medium ones).
pub const DISCREPANCY_HARD_CAP: usize = 5;

/// Verify a merged document and attach the report under the mode's key.
///
/// Returns the annotated document, the report and the classification.
pub async fn verify_document(
    model: &dyn GenerativeModel,
    mut doc: Value,
    config: &ExtractionConfig,
) -> (Value, VerificationReport, DocumentType) {
    let mode = config.verification;
    let document_type = classify(&doc);
    info!("Verifying document as {} ({:?} mode)", document_type, mode);

    let document_json = serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string());
    let request = GenerationRequest::new(ModelTask::Verification)
        .with_options(config)
        .text(verification_prompt(mode, document_type, &document_json))
        .json_output();

    let mut report = match call_model(model, &request, config, "Verification").await {
        Ok(reply) => match parse_typed::<VerificationReport>(&reply.text) {
            Ok(report) => report,
            Err(e) => {
                warn!("Verification reply unparseable: {}", e);
                let mut report = VerificationReport::failed(e.to_string());
                report.raw_response = Some(e.raw);
                report
            }
        },
        Err((e, _)) => {
            warn!("Verification call failed: {}", e);
            VerificationReport::failed(format!("Verification failed: {}", e))
        }
    };

    report.discrepancies = cap_discrepancies(std::mem::take(&mut report.discrepancies));
    report.document_type = Some(document_type);

    if let Value::Object(map) = &mut doc {
        match serde_json::to_value(&report) {
            Ok(v) => {
                map.insert(mode.report_key().to_string(), v);
            }
            Err(e) => warn!("Could not serialise verification report: {}", e),
        }
    }

    (doc, report, document_type)
}

/// Trim a long discrepancy list to the ones that matter.
///
/// More than [`DISCREPANCY_SOFT_CAP`]: keep High and Medium. Still more than
/// [`DISCREPANCY_HARD_CAP`]: keep only High if any exist, otherwise the first
/// `DISCREPANCY_HARD_CAP` Medium. Order is preserved throughout.
pub fn cap_discrepancies(discrepancies: Vec<Discrepancy>) -> Vec<Discrepancy> {
    if discrepancies.len() <= DISCREPANCY_SOFT_CAP {
        return discrepancies;
    }

    let kept: Vec<Discrepancy> = discrepancies
        .into_iter()
        .filter(|d| d.significance != Significance::Low)
        .collect();
    if kept.len() <= DISCREPANCY_HARD_CAP {
        return kept;
    }

    if kept.iter().any(|d| d.significance == Significance::High) {
        kept.into_iter()
            .filter(|d| d.significance == Significance::High)
            .collect()
    } else {
        kept.into_iter().take(DISCREPANCY_HARD_CAP).collect()
    }
}
