//! Read models and projections for the ledger query side.
//!
//! This crate provides the query side of the system:
//! - [`Projection`] trait for processing journal entries into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding entries from the journal to projections
//! - Three read model views: account balances, profit records, financial summaries

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    AccountBalanceSummary, AccountBalancesView, FinancialSummary, FinancialSummaryView, Period,
    ProfitRecordSummary, ProfitRecordsView,
};
