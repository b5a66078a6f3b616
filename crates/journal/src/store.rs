use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EntryQuery, JournalEntry, Result, Version};

/// Options for appending entries to the journal.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of journal entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<JournalEntry>> + Send>>;

/// Core trait for journal implementations.
///
/// A journal is responsible for persisting and retrieving entries.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends entries to the journal.
    ///
    /// Entries are appended atomically - either all succeed or none do.
    /// If `options.expected_version` is set, the operation will fail with
    /// `ConcurrencyConflict` if the current version doesn't match.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all entries for a specific aggregate.
    ///
    /// Entries are returned in version order (oldest first).
    async fn entries_for_aggregate(&self, aggregate_id: AggregateId)
    -> Result<Vec<JournalEntry>>;

    /// Retrieves all entries for an aggregate starting from a specific version.
    async fn entries_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<JournalEntry>>;

    /// Retrieves entries matching a query.
    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<JournalEntry>>;

    /// Retrieves entries by event type.
    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<JournalEntry>>;

    /// Streams all entries in the journal.
    ///
    /// Entries are returned in insertion order.
    async fn stream_all_entries(&self) -> Result<EntryStream>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for journals.
#[async_trait]
pub trait JournalExt: Journal {
    /// Appends a single entry to the journal.
    async fn append_entry(&self, entry: JournalEntry, options: AppendOptions) -> Result<Version> {
        self.append(vec![entry], options).await
    }

    /// Checks if an aggregate exists (has any entries).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.aggregate_version(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all Journal implementations
impl<T: Journal + ?Sized> JournalExt for T {}

/// Error returned when building an invalid batch for appending.
#[derive(Debug, Clone)]
pub struct AppendValidationError {
    pub message: String,
}

impl std::fmt::Display for AppendValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Append validation error: {}", self.message)
    }
}

impl std::error::Error for AppendValidationError {}

/// Validates entries before appending.
pub fn validate_entries_for_append(
    entries: &[JournalEntry],
) -> std::result::Result<(), AppendValidationError> {
    if entries.is_empty() {
        return Err(AppendValidationError {
            message: "Cannot append empty entry list".to_string(),
        });
    }

    // All entries must be for the same aggregate
    let first = &entries[0];
    for entry in entries.iter().skip(1) {
        if entry.aggregate_id != first.aggregate_id {
            return Err(AppendValidationError {
                message: "All entries must be for the same aggregate".to_string(),
            });
        }
        if entry.aggregate_type != first.aggregate_type {
            return Err(AppendValidationError {
                message: "All entries must have the same aggregate type".to_string(),
            });
        }
    }

    // Versions must be sequential
    let mut expected_version = first.version;
    for entry in entries.iter().skip(1) {
        expected_version = expected_version.next();
        if entry.version != expected_version {
            return Err(AppendValidationError {
                message: format!(
                    "Entry versions must be sequential. Expected {}, got {}",
                    expected_version, entry.version
                ),
            });
        }
    }

    Ok(())
}
