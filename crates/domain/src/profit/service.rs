//! Profit service wrapping the profit engine and record aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use journal::Journal;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    OrderFacts, ProfitBreakdown, ProfitEngine, ProfitRecord, profit_stream_id,
};

impl From<super::ProfitError> for DomainError {
    fn from(e: super::ProfitError) -> Self {
        DomainError::Profit(e)
    }
}

/// Service for recording and settling order profits.
///
/// Wraps the command handler for the profit record aggregate and the pure
/// profit engine. The persisted record is authoritative; the engine only
/// provides estimates for orders that were never recorded.
pub struct ProfitService<J: Journal> {
    handler: CommandHandler<J, ProfitRecord>,
    engine: ProfitEngine,
}

impl<J: Journal> ProfitService<J> {
    /// Creates a new profit service with the given journal and default rules.
    pub fn new(journal: J) -> Self {
        Self::with_engine(journal, ProfitEngine::default())
    }

    /// Creates a new profit service with explicit engine rules.
    pub fn with_engine(journal: J, engine: ProfitEngine) -> Self {
        Self {
            handler: CommandHandler::new(journal),
            engine,
        }
    }

    /// Returns the profit engine.
    pub fn engine(&self) -> &ProfitEngine {
        &self.engine
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<J, ProfitRecord> {
        &self.handler
    }

    /// Computes and records profit for a fulfilled order.
    ///
    /// The breakdown is computed with the current share rules and frozen
    /// into the record.
    #[tracing::instrument(skip(self, facts), fields(order_id = %facts.order_id))]
    pub async fn record_order_profit(
        &self,
        facts: &OrderFacts,
    ) -> Result<CommandResult<ProfitRecord>, DomainError> {
        let breakdown = self.engine.compute(facts);
        let stream_id = profit_stream_id(facts.order_id);

        self.handler
            .execute(stream_id, |record| record.record(facts, breakdown))
            .await
    }

    /// Loads the profit record for an order.
    ///
    /// Returns None if no profit has been recorded.
    #[tracing::instrument(skip(self))]
    pub async fn get_record(
        &self,
        order_id: OrderId,
    ) -> Result<Option<ProfitRecord>, DomainError> {
        self.handler.load_existing(profit_stream_id(order_id)).await
    }

    /// Returns the profit breakdown for an order.
    ///
    /// If a record exists, its frozen numbers win. Otherwise the breakdown
    /// is estimated from the given facts with the current rules.
    #[tracing::instrument(skip(self, facts), fields(order_id = %facts.order_id))]
    pub async fn profit_for_order(
        &self,
        facts: &OrderFacts,
    ) -> Result<ProfitBreakdown, DomainError> {
        if let Some(record) = self.get_record(facts.order_id).await?
            && let Some(breakdown) = record.breakdown()
        {
            return Ok(breakdown);
        }

        Ok(self.engine.compute(facts))
    }

    /// Settles the employee's share of an order's profit.
    #[tracing::instrument(skip(self))]
    pub async fn settle(
        &self,
        order_id: OrderId,
        claimant: EmployeeId,
        settled_at: DateTime<Utc>,
        invoice_id: AggregateId,
    ) -> Result<CommandResult<ProfitRecord>, DomainError> {
        self.handler
            .execute(profit_stream_id(order_id), |record| {
                record.settle(claimant, settled_at, invoice_id)
            })
            .await
    }

    /// Rolls back a settlement on an order's profit record.
    #[tracing::instrument(skip(self))]
    pub async fn revert_settlement(
        &self,
        order_id: OrderId,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<CommandResult<ProfitRecord>, DomainError> {
        let reason = reason.into();
        self.handler
            .execute(profit_stream_id(order_id), |record| {
                record.revert_settlement(reason)
            })
            .await
    }
}
