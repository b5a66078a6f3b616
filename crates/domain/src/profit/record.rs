//! Profit record aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use journal::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    OrderFacts, ProfitBreakdown, ProfitError, ProfitEvent, SellerRole,
    events::{ProfitRecordedData, ProfitSettledData},
};

/// Returns the journal stream ID for an order's profit record.
///
/// The stream is keyed by the order UUID, so at most one profit record can
/// exist per order; a second recording fails the new-stream version check.
pub fn profit_stream_id(order_id: OrderId) -> AggregateId {
    AggregateId::from_uuid(order_id.as_uuid())
}

/// Settlement status of a profit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfitStatus {
    /// Recorded but not yet paid out.
    #[default]
    Pending,

    /// Employee share has been paid out.
    Settled,
}

impl ProfitStatus {
    /// Returns true if the record can be settled.
    pub fn can_settle(&self) -> bool {
        matches!(self, ProfitStatus::Pending)
    }
}

/// Profit record aggregate root.
///
/// The persisted record is authoritative: once recorded, its numbers never
/// change even if share rules change later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitRecord {
    /// Journal stream ID (derived from the order ID).
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// The order this record belongs to.
    order_id: Option<OrderId>,

    /// The employee who made the sale.
    employee_id: Option<EmployeeId>,

    /// Role of the seller at sale time.
    seller_role: Option<SellerRole>,

    /// Recorded breakdown.
    breakdown: Option<ProfitBreakdown>,

    /// Delivery fee at sale time.
    delivery_fee: Money,

    /// When the sale happened.
    sold_at: Option<DateTime<Utc>>,

    /// Settlement status.
    status: ProfitStatus,

    /// Settlement details, if settled.
    settled_at: Option<DateTime<Utc>>,

    /// Invoice the settlement was paid under.
    invoice_id: Option<AggregateId>,
}

impl Aggregate for ProfitRecord {
    type Event = ProfitEvent;
    type Error = ProfitError;

    fn aggregate_type() -> &'static str {
        "ProfitRecord"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProfitEvent::ProfitRecorded(data) => self.apply_profit_recorded(data),
            ProfitEvent::ProfitSettled(data) => self.apply_profit_settled(data),
            ProfitEvent::SettlementReverted(_) => {
                self.status = ProfitStatus::Pending;
                self.settled_at = None;
                self.invoice_id = None;
            }
        }
    }
}

// Query methods
impl ProfitRecord {
    /// Returns the order this record belongs to.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Returns the employee who made the sale.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    /// Returns the seller's role at sale time.
    pub fn seller_role(&self) -> Option<SellerRole> {
        self.seller_role
    }

    /// Returns the recorded breakdown.
    pub fn breakdown(&self) -> Option<ProfitBreakdown> {
        self.breakdown
    }

    /// Returns the delivery fee at sale time.
    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    /// Returns when the sale happened.
    pub fn sold_at(&self) -> Option<DateTime<Utc>> {
        self.sold_at
    }

    /// Returns the settlement status.
    pub fn status(&self) -> ProfitStatus {
        self.status
    }

    /// Returns when the record was settled.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    /// Returns the invoice the settlement was paid under.
    pub fn invoice_id(&self) -> Option<AggregateId> {
        self.invoice_id
    }
}

// Command methods (return events)
impl ProfitRecord {
    /// Records profit for a fulfilled order.
    pub fn record(
        &self,
        facts: &OrderFacts,
        breakdown: ProfitBreakdown,
    ) -> Result<Vec<ProfitEvent>, ProfitError> {
        if self.order_id.is_some() {
            return Err(ProfitError::AlreadyRecorded {
                order_id: facts.order_id,
            });
        }

        if !facts.is_fulfilled() {
            return Err(ProfitError::NotFulfilled {
                order_id: facts.order_id,
            });
        }

        Ok(vec![ProfitEvent::profit_recorded(
            facts.order_id,
            facts.created_by,
            facts.seller_role,
            facts.delivery_fee,
            breakdown,
            facts.sold_at,
        )])
    }

    /// Settles the employee's share of this record.
    ///
    /// The claimant must own the record and the record must be pending.
    pub fn settle(
        &self,
        claimant: EmployeeId,
        settled_at: DateTime<Utc>,
        invoice_id: AggregateId,
    ) -> Result<Vec<ProfitEvent>, ProfitError> {
        let order_id = self.order_id.ok_or(ProfitError::NotRecorded)?;

        if !self.status.can_settle() {
            return Err(ProfitError::AlreadySettled { order_id });
        }

        if self.employee_id != Some(claimant) {
            return Err(ProfitError::NotOwner { order_id, claimant });
        }

        let amount = self
            .breakdown
            .map(|b| b.employee_profit)
            .unwrap_or_default();

        Ok(vec![ProfitEvent::profit_settled(
            invoice_id, settled_at, amount,
        )])
    }

    /// Rolls back a settlement.
    pub fn revert_settlement(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<ProfitEvent>, ProfitError> {
        self.order_id.ok_or(ProfitError::NotRecorded)?;

        if self.status != ProfitStatus::Settled {
            return Err(ProfitError::NotSettled);
        }

        Ok(vec![ProfitEvent::settlement_reverted(reason)])
    }
}

// Apply event helpers
impl ProfitRecord {
    fn apply_profit_recorded(&mut self, data: ProfitRecordedData) {
        self.id = Some(profit_stream_id(data.order_id));
        self.order_id = Some(data.order_id);
        self.employee_id = Some(data.employee_id);
        self.seller_role = Some(data.seller_role);
        self.breakdown = Some(ProfitBreakdown {
            total_cost: data.total_cost,
            revenue_excl_delivery: data.revenue,
            total_profit: data.total_profit,
            employee_profit: data.employee_profit,
            system_profit: data.system_profit,
        });
        self.delivery_fee = data.delivery_fee;
        self.sold_at = Some(data.sold_at);
        self.status = ProfitStatus::Pending;
    }

    fn apply_profit_settled(&mut self, data: ProfitSettledData) {
        self.status = ProfitStatus::Settled;
        self.settled_at = Some(data.settled_at);
        self.invoice_id = Some(data.invoice_id);
    }
}
