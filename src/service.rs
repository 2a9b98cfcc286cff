//! Request-level facade over the extractor and the ledger.
//!
//! [`DocumentService`] is what an HTTP handler or the CLI calls. Every
//! operation reports failure through [`RequestError`]; [`ApiResponse`] maps
//! a result onto the wire envelope:
//!
//! ```json
//! {"response": <document json or text>}
//! {"error": "Request failed", "detail": "<message>"}
//! ```

use crate::document::MediaType;
use crate::error::DocExtractError;
use crate::extract::Extractor;
use crate::ledger::{
    parse_delimited, transactions_from_document, Categorizer, ExportFormat, Feedback,
    LedgerError, Transaction, TransactionStore,
};
use crate::output::{DocumentBody, ExtractionOutput};
use crate::research::{research_vendor, ResearchError, VendorResearch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Any failure of a service request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Extraction(#[from] DocExtractError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Research(#[from] ResearchError),
}

/// The wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Response { response: Value },
    Error { error: String, detail: String },
}

impl ApiResponse {
    pub fn ok(response: Value) -> Self {
        ApiResponse::Response { response }
    }

    /// The generic failure envelope; no partial data is returned.
    pub fn failed(detail: impl Into<String>) -> Self {
        ApiResponse::Error {
            error: "Request failed".to_string(),
            detail: detail.into(),
        }
    }

    pub fn from_result<T: Serialize>(result: Result<T, RequestError>) -> Self {
        match result.map(serde_json::to_value) {
            Ok(Ok(v)) => Self::ok(v),
            Ok(Err(e)) => Self::failed(LedgerError::from(e).to_string()),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error { .. })
    }
}

/// Extraction plus the transaction ledger behind it.
pub struct DocumentService {
    extractor: Extractor,
    store: Arc<TransactionStore>,
    categorizer: Arc<Categorizer>,
}

impl DocumentService {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor,
            store: Arc::new(TransactionStore::new()),
            categorizer: Arc::new(Categorizer::default()),
        }
    }

    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = Arc::new(categorizer);
        self
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Handle one upload and wrap the outcome in the envelope.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>, schema_name: Option<&str>) -> ApiResponse {
        let result = self
            .extract_and_record(filename, bytes, schema_name)
            .await
            .map(|output| output.body.to_value());
        if let Err(ref e) = result {
            error!("Upload of '{}' failed: {}", filename, e);
        }
        ApiResponse::from_result(result)
    }

    /// Extract a document and store the transactions it yields.
    pub async fn extract_and_record(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        schema_name: Option<&str>,
    ) -> Result<ExtractionOutput, RequestError> {
        let mut transactions = if MediaType::detect(filename, &bytes).is_text() {
            parse_delimited(&bytes)
        } else {
            Vec::new()
        };
        let output = self.extractor.process_bytes(filename, bytes, schema_name).await?;

        if transactions.is_empty() {
            if let DocumentBody::Structured(ref v) = output.body {
                transactions = transactions_from_document(v);
            }
        }
        self.categorizer.categorize(&mut transactions);
        let added = self.store.add(transactions);
        info!("'{}': {} transactions recorded", filename, added);

        Ok(output)
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.store.list()
    }

    /// Apply a category correction and remember it for similar transactions.
    pub fn submit_feedback(&self, feedback: Feedback) -> Result<Transaction, RequestError> {
        let tx = self
            .store
            .apply_feedback(&feedback.transaction_id, &feedback.corrected_category)?;
        self.categorizer.learn(&tx, &feedback.corrected_category);
        self.store.add_feedback(feedback)?;
        Ok(tx)
    }

    /// Export every stored transaction; `format` is csv, json, xml or qbo.
    pub fn export(&self, format: &str) -> Result<String, RequestError> {
        let format: ExportFormat = format.parse()?;
        Ok(format.render(&self.store.list())?)
    }

    /// Research the vendor named in a stored transaction's description.
    pub async fn research_transaction(&self, transaction_id: &str) -> Result<VendorResearch, RequestError> {
        let tx = self.store.get(transaction_id)?;
        let research = research_vendor(
            self.extractor.model().as_ref(),
            &tx.description,
            self.extractor.config(),
        )
        .await?;
        Ok(research)
    }

    /// Research a vendor by name.
    pub async fn research_vendor(&self, vendor_name: &str) -> Result<VendorResearch, RequestError> {
        Ok(research_vendor(
            self.extractor.model().as_ref(),
            vendor_name,
            self.extractor.config(),
        )
        .await?)
    }
}
