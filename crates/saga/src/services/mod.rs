//! External service traits and in-memory implementations for flow steps.

pub mod expenses;
pub mod invoices;
pub mod stock;

pub use expenses::{ExpenseCategory, ExpenseRecord, ExpenseService, InMemoryExpenseService};
pub use invoices::{
    InMemoryInvoiceService, InvoiceService, PurchaseInvoice, SettlementInvoice,
};
pub use stock::{InMemoryStockService, StockLevel, StockService};
