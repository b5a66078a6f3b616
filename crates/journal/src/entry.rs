use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// Unique identifier for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntryId> for Uuid {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

/// Version number for an aggregate, used for optimistic concurrency control.
///
/// Versions start at 1 for the first entry and increment by 1 for each
/// subsequent entry on an aggregate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a new aggregate.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first entry.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A journal entry wrapping a domain event with its metadata.
///
/// This structure carries everything needed for storage and retrieval:
/// the aggregate it belongs to, its version, and the JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for this entry.
    pub entry_id: EntryId,

    /// The type of the event (e.g., "AccountOpened", "MovementRecorded").
    pub entry_type: String,

    /// The aggregate this entry belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "CashAccount", "ProfitRecord").
    pub aggregate_type: String,

    /// The version of the aggregate after this entry.
    pub version: Version,

    /// When the entry was created.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the entry.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl JournalEntry {
    /// Creates a new journal entry builder.
    pub fn builder() -> JournalEntryBuilder {
        JournalEntryBuilder::default()
    }
}

/// Builder for constructing journal entries.
#[derive(Debug, Default)]
pub struct JournalEntryBuilder {
    entry_id: Option<EntryId>,
    entry_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl JournalEntryBuilder {
    /// Sets the entry ID. If not set, a new ID will be generated.
    pub fn entry_id(mut self, id: EntryId) -> Self {
        self.entry_id = Some(id);
        self
    }

    /// Sets the entry type.
    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the journal entry.
    ///
    /// # Panics
    ///
    /// Panics if required fields (entry_type, aggregate_id, aggregate_type, version, payload)
    /// are not set.
    pub fn build(self) -> JournalEntry {
        JournalEntry {
            entry_id: self.entry_id.unwrap_or_default(),
            entry_type: self.entry_type.expect("entry_type is required"),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            aggregate_type: self.aggregate_type.expect("aggregate_type is required"),
            version: self.version.expect("version is required"),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.expect("payload is required"),
            metadata: self.metadata,
        }
    }

    /// Tries to build the journal entry, returning None if required fields are missing.
    pub fn try_build(self) -> Option<JournalEntry> {
        Some(JournalEntry {
            entry_id: self.entry_id.unwrap_or_default(),
            entry_type: self.entry_type?,
            aggregate_id: self.aggregate_id?,
            aggregate_type: self.aggregate_type?,
            version: self.version?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload?,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_new_creates_unique_ids() {
        let id1 = EntryId::new();
        let id2 = EntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn journal_entry_builder() {
        let aggregate_id = AggregateId::new();
        let payload = serde_json::json!({"amount": 1000});

        let entry = JournalEntry::builder()
            .entry_type("MovementRecorded")
            .aggregate_id(aggregate_id)
            .aggregate_type("CashAccount")
            .version(Version::first())
            .payload_raw(payload.clone())
            .metadata("correlation_id", serde_json::json!("123"))
            .build();

        assert_eq!(entry.entry_type, "MovementRecorded");
        assert_eq!(entry.aggregate_id, aggregate_id);
        assert_eq!(entry.aggregate_type, "CashAccount");
        assert_eq!(entry.version, Version::first());
        assert_eq!(entry.payload, payload);
        assert_eq!(
            entry.metadata.get("correlation_id"),
            Some(&serde_json::json!("123"))
        );
    }

    #[test]
    fn journal_entry_try_build_returns_none_on_missing_fields() {
        let result = JournalEntry::builder().try_build();
        assert!(result.is_none());
    }
}
