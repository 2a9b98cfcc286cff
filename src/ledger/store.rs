use super::model::{Feedback, Transaction};
use super::LedgerError;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// In-memory transaction and feedback storage, safe to share across tasks.
#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: RwLock<Vec<Transaction>>,
    feedback: RwLock<Vec<Feedback>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Transaction>> {
        self.transactions.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Transaction>> {
        self.transactions.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add(&self, transactions: impl IntoIterator<Item = Transaction>) -> usize {
        let mut all = self.write();
        let before = all.len();
        all.extend(transactions);
        debug!("Stored {} transactions ({} total)", all.len() - before, all.len());
        all.len() - before
    }

    /// Snapshot of every stored transaction, in insertion order.
    pub fn list(&self) -> Vec<Transaction> {
        self.read().clone()
    }

    pub fn get(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        self.read()
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Record feedback for a stored transaction.
    pub fn add_feedback(&self, feedback: Feedback) -> Result<(), LedgerError> {
        self.get(&feedback.transaction_id)?;
        self.feedback
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(feedback);
        Ok(())
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.feedback
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Set the category of one stored transaction.
    pub fn apply_feedback(&self, transaction_id: &str, category: &str) -> Result<Transaction, LedgerError> {
        let mut all = self.write();
        let tx = all
            .iter_mut()
            .find(|t| t.transaction_id == transaction_id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;
        tx.category = Some(category.to_string());
        Ok(tx.clone())
    }
}
