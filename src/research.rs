//! Vendor research: a free-text business profile of a document's vendor.

use crate::config::ExtractionConfig;
use crate::error::ServiceError;
use crate::model::{GenerationRequest, GenerativeModel, ModelTask};
use crate::pipeline::llm::call_model;
use crate::prompts::vendor_research_prompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Vendor research failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResearchError {
    #[error("vendor name is required")]
    EmptyVendorName,

    #[error("vendor research failed: {0}")]
    Service(#[from] ServiceError),
}

/// The result of researching one vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorResearch {
    pub vendor_name: String,
    pub vendor_info: String,
}

/// Ask the model for a short profile of `vendor_name`.
pub async fn research_vendor(
    model: &dyn GenerativeModel,
    vendor_name: &str,
    config: &ExtractionConfig,
) -> Result<VendorResearch, ResearchError> {
    let vendor_name = vendor_name.trim();
    if vendor_name.is_empty() {
        return Err(ResearchError::EmptyVendorName);
    }
    info!("Researching vendor '{}'", vendor_name);

    let request = GenerationRequest::new(ModelTask::VendorResearch)
        .with_options(config)
        .text(vendor_research_prompt(vendor_name));
    let reply = call_model(model, &request, config, "Vendor research")
        .await
        .map_err(|(e, _)| ResearchError::Service(e))?;

    Ok(VendorResearch {
        vendor_name: vendor_name.to_string(),
        vendor_info: reply.text.trim().to_string(),
    })
}

/// The vendor name recorded in an extracted document, if any.
pub fn vendor_name_from_document(doc: &Value) -> Option<&str> {
    doc.pointer("/partyInformation/vendor/name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use serde_json::json;

    #[tokio::test]
    async fn researches_named_vendor() {
        let model = MockModel::constant("  Acme Corp sells anvils.\n");
        let result = research_vendor(&model, " Acme Corp ", &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.vendor_name, "Acme Corp");
        assert_eq!(result.vendor_info, "Acme Corp sells anvils.");
        assert_eq!(model.calls()[0].task, ModelTask::VendorResearch);
        assert!(model.calls()[0].prompt.contains("\"Acme Corp\""));
    }

    #[tokio::test]
    async fn rejects_empty_name_without_calling() {
        let model = MockModel::constant("unused");
        let err = research_vendor(&model, "   ", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ResearchError::EmptyVendorName);
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn reads_vendor_name() {
        let doc = json!({"partyInformation": {"vendor": {"name": "Stripe"}}});
        assert_eq!(vendor_name_from_document(&doc), Some("Stripe"));
        assert_eq!(vendor_name_from_document(&json!({"partyInformation": {"vendor": {"name": ""}}})), None);
    }

    #[test]
    fn serialises_camel_case() {
        let r = VendorResearch {
            vendor_name: "A".into(),
            vendor_info: "B".into(),
        };
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({"vendorName": "A", "vendorInfo": "B"})
        );
    }
}
