//! Append-only journal of domain events.
//!
//! The journal is the single source of truth for the ledger system.
//! Aggregate state is always rebuilt by replaying entries; there is no
//! snapshot store, so a balance can never come from a stale cache.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use entry::{EntryId, JournalEntry, JournalEntryBuilder, Version};
pub use error::{JournalError, Result};
pub use memory::InMemoryJournal;
pub use postgres::PostgresJournal;
pub use query::EntryQuery;
pub use store::{AppendOptions, EntryStream, Journal, JournalExt};
