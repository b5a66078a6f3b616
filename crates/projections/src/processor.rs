//! Projection processor for feeding journal entries to projections.

use futures_util::StreamExt;
use journal::{Journal, JournalEntry};

use crate::Result;
use crate::projection::Projection;

/// Processes entries from a journal and delivers them to projections.
///
/// The processor supports:
/// - Catch-up: replays all entries from the journal to bring projections up to date
/// - Single entry delivery: delivers a new entry to all projections
/// - Rebuild: resets all projections and replays from scratch
pub struct ProjectionProcessor<J: Journal> {
    journal: J,
    projections: Vec<Box<dyn Projection>>,
}

impl<J: Journal> ProjectionProcessor<J> {
    /// Creates a new processor with the given journal.
    pub fn new(journal: J) -> Self {
        Self {
            journal,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Runs catch-up processing: streams all entries from the journal and
    /// delivers them to each projection that hasn't already seen them.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut stream = self.journal.stream_all_entries().await?;
        let mut entry_index: u64 = 0;

        while let Some(result) = stream.next().await {
            let entry = result?;
            entry_index += 1;

            for projection in &self.projections {
                let pos = projection.position().await;
                if pos.entries_processed < entry_index {
                    projection.handle(&entry).await?;
                    metrics::counter!("projections_entries_processed").increment(1);
                }
            }
        }

        tracing::info!(entries_processed = entry_index, "catch-up complete");

        Ok(())
    }

    /// Delivers a single entry to all registered projections.
    #[tracing::instrument(skip(self, entry), fields(entry_type = %entry.entry_type))]
    pub async fn process_entry(&self, entry: &JournalEntry) -> Result<()> {
        for projection in &self.projections {
            projection.handle(entry).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays all entries from the journal.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
