//! Domain layer for the ledger system.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - CashAccount aggregate and LedgerService for the cash ledger
//! - ProfitEngine and ProfitRecord aggregate for profit accounting

pub mod aggregate;
pub mod command;
pub mod error;
pub mod ledger;
pub mod money;
pub mod profit;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use ledger::{
    AccountError, AccountEvent, CashAccount, DeactivateAccount, LedgerService, Movement,
    MovementDirection, OpenAccount, RecordMovement, ReferenceKind,
};
pub use money::Money;
pub use profit::{
    OrderFacts, OrderLine, OrderStatus, ProfitBreakdown, ProfitEngine, ProfitError, ProfitEvent,
    ProfitRecord, ProfitService, ProfitStatus, SellerRole, ShareRules,
};
