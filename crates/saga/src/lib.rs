//! Multi-step flows with compensating actions.
//!
//! This crate orchestrates the two operations that touch several parts of
//! the system at once:
//!
//! - **Purchase invoicing**: validate a draft, create the invoice, apply
//!   stock per line, pay the supplier from the operating account, and record
//!   expense rows.
//! - **Profit settlement**: check every claimed profit record, create one
//!   settlement invoice, settle the records under a shared timestamp, pay
//!   the dues out, and record the dues expense.
//!
//! Each flow is event-sourced under its own journal stream. If a step fails
//! after side effects have landed, previously completed steps are compensated
//! in reverse order and the failure is surfaced to the caller.

pub mod aggregate;
pub mod error;
pub mod events;
pub mod flows;
pub mod purchase;
pub mod services;
pub mod settlement;
pub mod state;

pub use aggregate::FlowInstance;
pub use error::FlowError;
pub use events::FlowEvent;
pub use purchase::{PurchaseCoordinator, PurchaseDraft, PurchaseLine, PurchaseOutcome};
pub use services::{
    ExpenseCategory, ExpenseRecord, ExpenseService, InMemoryExpenseService, InMemoryInvoiceService,
    InMemoryStockService, InvoiceService, PurchaseInvoice, SettlementInvoice, StockLevel,
    StockService,
};
pub use settlement::{SettlementCoordinator, SettlementOutcome};
pub use state::FlowState;
