//! Shared identifier types used across the ledger system.

pub mod types;

pub use types::{AggregateId, EmployeeId, OrderId};
