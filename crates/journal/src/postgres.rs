use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EntryId, EntryQuery, JournalEntry, JournalError, Result, Version,
    store::{AppendOptions, EntryStream, Journal, validate_entries_for_append},
};

/// PostgreSQL-backed journal implementation.
#[derive(Clone)]
pub struct PostgresJournal {
    pool: PgPool,
}

impl PostgresJournal {
    /// Creates a new PostgreSQL journal.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<JournalEntry> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(JournalEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            entry_type: row.try_get("entry_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl Journal for PostgresJournal {
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Version> {
        validate_entries_for_append(&entries).map_err(|e| {
            JournalError::Serialization(serde_json::Error::io(std::io::Error::other(e.message)))
        })?;

        let first_entry = &entries[0];
        let aggregate_id = first_entry.aggregate_id;

        // Start a transaction
        let mut tx = self.pool.begin().await?;

        // Check expected version if specified
        if let Some(expected) = options.expected_version {
            let current_version: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(version) FROM journal_entries WHERE aggregate_id = $1",
            )
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

            let actual = Version::new(current_version.unwrap_or(0));

            if actual != expected {
                return Err(JournalError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        // Insert all entries
        let mut last_version = Version::initial();
        for entry in &entries {
            let metadata_json = serde_json::to_value(&entry.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO journal_entries (id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.entry_id.as_uuid())
            .bind(&entry.entry_type)
            .bind(entry.aggregate_id.as_uuid())
            .bind(&entry.aggregate_type)
            .bind(entry.version.as_i64())
            .bind(entry.timestamp)
            .bind(&entry.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // Check if this is a unique constraint violation (concurrency conflict)
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return JournalError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: entry.version,
                    };
                }
                JournalError::Database(e)
            })?;

            last_version = entry.version;
        }

        tx.commit().await?;
        Ok(last_version)
    }

    async fn entries_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM journal_entries
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn entries_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM journal_entries
            WHERE aggregate_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<JournalEntry>> {
        let mut sql = String::from(
            "SELECT id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata FROM journal_entries WHERE 1=1",
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.entry_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND entry_type = ANY(${param_count})"));
        }
        if query.from_version.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND version >= ${param_count}"));
        }
        if query.to_version.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND version <= ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY timestamp ASC, version ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(agg_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(agg_type);
        }
        if let Some(entry_types) = query.entry_types {
            sqlx_query = sqlx_query.bind(entry_types);
        }
        if let Some(from_version) = query.from_version {
            sqlx_query = sqlx_query.bind(from_version.as_i64());
        }
        if let Some(to_version) = query.to_version {
            sqlx_query = sqlx_query.bind(to_version.as_i64());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM journal_entries
            WHERE entry_type = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(entry_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn stream_all_entries(&self) -> Result<EntryStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, entry_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM journal_entries
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_entry(row),
            Err(e) => Err(JournalError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM journal_entries WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
