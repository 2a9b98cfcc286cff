//! Transaction ledger built from extracted documents.
//!
//! Transactions come from two places: delimited text uploads
//! (`date,amount,description,account_code` per line) and the `lineItems` of
//! an extracted document. They are kept in an in-memory
//! [`TransactionStore`], categorised by amount with user feedback taking
//! precedence, and exported as CSV, JSON, XML or QuickBooks IIF-style QBO.

pub mod categorize;
pub mod export;
pub mod model;
pub mod parse;
pub mod store;

pub use categorize::Categorizer;
pub use export::ExportFormat;
pub use model::{Feedback, Transaction};
pub use parse::{parse_delimited, transactions_from_document};
pub use store::TransactionStore;

use thiserror::Error;

/// Ledger failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Unsupported export format '{0}' (expected csv, json, xml or qbo)")]
    UnsupportedExportFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
