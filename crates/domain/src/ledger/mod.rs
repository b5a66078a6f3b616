//! Cash account aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::CashAccount;
pub use commands::*;
pub use events::{
    AccountDeactivatedData, AccountEvent, AccountOpenedData, MovementDirection,
    MovementRecordedData, ReferenceKind,
};
pub use service::{LedgerService, Movement};

use crate::money::Money;
use thiserror::Error;

/// Errors that can occur during cash account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Account is already opened.
    #[error("Account already opened")]
    AlreadyOpened,

    /// Account has not been opened yet.
    #[error("Account not open")]
    NotOpen,

    /// Account is deactivated.
    #[error("Account is inactive")]
    Inactive,

    /// Account name is required.
    #[error("Account name is required")]
    NameRequired,

    /// Movement amount must be strictly positive.
    #[error("Invalid amount: {amount} (must be greater than 0)")]
    InvalidAmount { amount: i64 },

    /// Outgoing movement would take the balance below zero.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },
}
