//! Amount-threshold categorisation with feedback overrides.

use super::model::Transaction;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

pub const LOW_VALUE: &str = "Low Value";
pub const HIGH_VALUE: &str = "High Value";

/// Assigns categories to transactions.
///
/// Amounts below the threshold are "Low Value", everything else "High
/// Value". A category learned from feedback applies to every transaction
/// with the same description and takes precedence over the threshold.
#[derive(Debug)]
pub struct Categorizer {
    threshold: f64,
    overrides: RwLock<HashMap<String, String>>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Categorizer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    fn key(description: &str) -> String {
        description.trim().to_lowercase()
    }

    /// The category for a transaction, without modifying it.
    pub fn category_for(&self, tx: &Transaction) -> String {
        let overrides = self.overrides.read().unwrap_or_else(|p| p.into_inner());
        if let Some(category) = overrides.get(&Self::key(&tx.description)) {
            return category.clone();
        }
        if tx.amount < self.threshold {
            LOW_VALUE.to_string()
        } else {
            HIGH_VALUE.to_string()
        }
    }

    /// Set `category` on every transaction.
    pub fn categorize(&self, transactions: &mut [Transaction]) {
        for tx in transactions.iter_mut() {
            tx.category = Some(self.category_for(tx));
        }
    }

    /// Remember a corrected category for transactions like `tx`.
    pub fn learn(&self, tx: &Transaction, corrected_category: &str) {
        info!(
            "Feedback for transaction {}: '{}' is now '{}'",
            tx.transaction_id, tx.description, corrected_category
        );
        self.overrides
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(Self::key(&tx.description), corrected_category.to_string());
    }
}
