use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EntryQuery, JournalEntry, JournalError, Result, Version,
    store::{AppendOptions, EntryStream, Journal, validate_entries_for_append},
};

/// In-memory journal implementation for testing.
///
/// This implementation stores all entries in memory and provides
/// the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl InMemoryJournal {
    /// Creates a new empty in-memory journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries stored.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Clears all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Version> {
        validate_entries_for_append(&entries).map_err(|e| {
            JournalError::Serialization(serde_json::Error::io(std::io::Error::other(e.message)))
        })?;

        let first_entry = &entries[0];
        let aggregate_id = first_entry.aggregate_id;

        let mut store = self.entries.write().await;

        // Get current version for this aggregate
        let current_version = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial());

        // Check expected version if specified
        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(JournalError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Check for version conflicts (unique constraint simulation)
        let first_new_version = first_entry.version;
        if first_new_version <= current_version && current_version != Version::initial() {
            return Err(JournalError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        // Store all entries
        let last_version = entries
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());
        store.extend(entries);

        Ok(last_version)
    }

    async fn entries_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<JournalEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    async fn entries_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<JournalEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<JournalEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store
            .iter()
            .filter(|e| {
                if let Some(id) = query.aggregate_id
                    && e.aggregate_id != id
                {
                    return false;
                }
                if let Some(ref agg_type) = query.aggregate_type
                    && &e.aggregate_type != agg_type
                {
                    return false;
                }
                if let Some(ref types) = query.entry_types
                    && !types.contains(&e.entry_type)
                {
                    return false;
                }
                if let Some(from) = query.from_version
                    && e.version < from
                {
                    return false;
                }
                if let Some(to) = query.to_version
                    && e.version > to
                {
                    return false;
                }
                if let Some(from) = query.from_timestamp
                    && e.timestamp < from
                {
                    return false;
                }
                if let Some(to) = query.to_timestamp
                    && e.timestamp > to
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        // Sort by timestamp then version
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.version.cmp(&b.version))
        });

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let entries: Vec<_> = entries.into_iter().skip(offset).collect();

        let entries = if let Some(limit) = query.limit {
            entries.into_iter().take(limit).collect()
        } else {
            entries
        };

        Ok(entries)
    }

    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<JournalEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn stream_all_entries(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let store = self.entries.read().await;
        let mut entries = store.clone();
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.entry_id.as_uuid().cmp(&b.entry_id.as_uuid()))
        });

        let stream = stream::iter(entries.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.entries.read().await;
        let version = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max();
        Ok(version)
    }
}
