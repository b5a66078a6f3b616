//! Domain error types.

use journal::JournalError;
use thiserror::Error;

use crate::ledger::AccountError;
use crate::profit::ProfitError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the journal.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// A cash account command was rejected.
    #[error("Account error: {0}")]
    Account(AccountError),

    /// A profit command was rejected.
    #[error("Profit error: {0}")]
    Profit(ProfitError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
