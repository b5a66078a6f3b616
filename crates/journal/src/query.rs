use chrono::{DateTime, Utc};

use crate::{AggregateId, Version};

/// Builder for constructing journal queries.
///
/// Allows filtering entries by various criteria such as aggregate ID,
/// event type, version range, and time range.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Filter by aggregate ID.
    pub aggregate_id: Option<AggregateId>,

    /// Filter by aggregate type.
    pub aggregate_type: Option<String>,

    /// Filter by entry types (any of these types).
    pub entry_types: Option<Vec<String>>,

    /// Filter by minimum version (inclusive).
    pub from_version: Option<Version>,

    /// Filter by maximum version (inclusive).
    pub to_version: Option<Version>,

    /// Filter by entries after this timestamp (inclusive).
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by entries before this timestamp (inclusive).
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl EntryQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific aggregate.
    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    /// Creates a query for entries of a specific type.
    pub fn for_entry_type(entry_type: impl Into<String>) -> Self {
        Self {
            entry_types: Some(vec![entry_type.into()]),
            ..Default::default()
        }
    }

    /// Filters by aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Filters by aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Filters by entry type.
    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_types = Some(vec![entry_type.into()]);
        self
    }

    /// Filters by multiple entry types (any of these).
    pub fn entry_types(mut self, entry_types: Vec<String>) -> Self {
        self.entry_types = Some(entry_types);
        self
    }

    /// Filters to entries starting from this version (inclusive).
    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    /// Filters to entries up to this version (inclusive).
    pub fn to_version(mut self, version: Version) -> Self {
        self.to_version = Some(version);
        self
    }

    /// Filters to entries after this timestamp (inclusive).
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to entries before this timestamp (inclusive).
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Limits the number of entries returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many entries before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_for_aggregate() {
        let id = AggregateId::new();
        let query = EntryQuery::for_aggregate(id);

        assert_eq!(query.aggregate_id, Some(id));
        assert!(query.entry_types.is_none());
    }

    #[test]
    fn query_for_entry_type() {
        let query = EntryQuery::for_entry_type("MovementRecorded");

        assert!(query.aggregate_id.is_none());
        assert_eq!(
            query.entry_types,
            Some(vec!["MovementRecorded".to_string()])
        );
    }

    #[test]
    fn query_builder_chain() {
        let id = AggregateId::new();
        let query = EntryQuery::new()
            .aggregate_id(id)
            .entry_type("MovementRecorded")
            .from_version(Version::new(1))
            .to_version(Version::new(10))
            .limit(100)
            .offset(0);

        assert_eq!(query.aggregate_id, Some(id));
        assert_eq!(
            query.entry_types,
            Some(vec!["MovementRecorded".to_string()])
        );
        assert_eq!(query.from_version, Some(Version::new(1)));
        assert_eq!(query.to_version, Some(Version::new(10)));
        assert_eq!(query.limit, Some(100));
        assert_eq!(query.offset, Some(0));
    }
}
