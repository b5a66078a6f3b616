//! Read model views for the ledger query side.

pub mod balances;
pub mod financial_summary;
pub mod profit_records;

pub use balances::{AccountBalanceSummary, AccountBalancesView};
pub use financial_summary::{FinancialSummary, FinancialSummaryView, Period};
pub use profit_records::{ProfitRecordSummary, ProfitRecordsView};
