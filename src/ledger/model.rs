use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub transaction_date: NaiveDateTime,
    pub amount: f64,
    pub description: String,
    pub account_code: String,
    pub category: Option<String>,
}

impl Transaction {
    /// A new uncategorised transaction with a fresh v4 id.
    pub fn new(
        transaction_date: NaiveDateTime,
        amount: f64,
        description: impl Into<String>,
        account_code: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            transaction_date,
            amount,
            description: description.into(),
            account_code: account_code.into(),
            category: None,
        }
    }
}

/// A user's correction of a transaction's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub transaction_id: String,
    pub corrected_category: String,
    #[serde(default)]
    pub comments: Option<String>,
}
