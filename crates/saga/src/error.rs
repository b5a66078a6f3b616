//! Flow error types.

use common::{AggregateId, EmployeeId, OrderId};
use domain::DomainError;
use journal::JournalError;
use thiserror::Error;

use crate::state::FlowState;

/// Errors that can occur during flow execution.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Flow is in an invalid state for the requested operation.
    #[error("Invalid flow state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: FlowState },

    /// A step failed and completed steps were compensated.
    #[error("Flow step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// A step failed and one or more compensating actions also failed,
    /// leaving partial effects behind.
    #[error("Compensation for step '{step}' failed: {reason}")]
    CompensationFailed { step: String, reason: String },

    /// The purchase draft was rejected before any side effect.
    #[error("Invalid purchase draft: {0}")]
    InvalidDraft(String),

    /// Purchase invoice not found.
    #[error("Purchase invoice not found: {0}")]
    PurchaseNotFound(String),

    /// Purchase invoice was already deleted.
    #[error("Purchase invoice already deleted: {0}")]
    PurchaseDeleted(String),

    /// Stock could not be updated for a SKU.
    #[error("Stock update failed for SKU {sku}: {reason}")]
    StockUpdate { sku: String, reason: String },

    /// No profit record exists for a claimed order.
    #[error("No profit record for order {0}")]
    ProfitRecordMissing(OrderId),

    /// A claimed profit record was already settled.
    #[error("Profit for order {0} already settled")]
    AlreadySettled(OrderId),

    /// A claimed profit record belongs to someone else.
    #[error("Profit for order {order_id} does not belong to employee {claimant}")]
    NotOwner {
        order_id: OrderId,
        claimant: EmployeeId,
    },

    /// Settlement was requested with no orders.
    #[error("Nothing to settle")]
    NothingToSettle,

    /// The same order was claimed more than once in a settlement request.
    #[error("Order {0} appears more than once in the settlement request")]
    DuplicateOrder(OrderId),

    /// Expense service error.
    #[error("Expense service error: {0}")]
    ExpenseService(String),

    /// Invoice service error.
    #[error("Invoice service error: {0}")]
    InvoiceService(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Journal error.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Flow not found.
    #[error("Flow not found: {0}")]
    FlowNotFound(AggregateId),
}

/// Convenience type alias for flow results.
pub type Result<T> = std::result::Result<T, FlowError>;
