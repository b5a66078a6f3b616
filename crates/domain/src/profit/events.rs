//! Profit record domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{ProfitBreakdown, SellerRole};

/// Events that can occur on a profit record aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProfitEvent {
    /// Profit was computed and recorded for an order.
    ProfitRecorded(ProfitRecordedData),

    /// The employee's share was paid out.
    ProfitSettled(ProfitSettledData),

    /// A settlement was rolled back.
    SettlementReverted(SettlementRevertedData),
}

impl DomainEvent for ProfitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProfitEvent::ProfitRecorded(_) => "ProfitRecorded",
            ProfitEvent::ProfitSettled(_) => "ProfitSettled",
            ProfitEvent::SettlementReverted(_) => "SettlementReverted",
        }
    }
}

/// Data for ProfitRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitRecordedData {
    /// The order the profit belongs to.
    pub order_id: OrderId,

    /// The employee who made the sale.
    pub employee_id: EmployeeId,

    /// Role of the seller at sale time.
    pub seller_role: SellerRole,

    /// Revenue excluding the delivery fee.
    pub revenue: Money,

    /// Delivery fee at sale time.
    pub delivery_fee: Money,

    /// Total acquisition cost.
    pub total_cost: Money,

    /// Total profit on the order.
    pub total_profit: Money,

    /// The employee's share.
    pub employee_profit: Money,

    /// The system's share.
    pub system_profit: Money,

    /// When the sale happened.
    pub sold_at: DateTime<Utc>,

    /// When the profit was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Data for ProfitSettled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitSettledData {
    /// The settlement invoice this record was paid under.
    pub invoice_id: AggregateId,

    /// Settlement timestamp, shared by every record in the batch.
    pub settled_at: DateTime<Utc>,

    /// Amount paid out (the employee's share at recording time).
    pub amount: Money,
}

/// Data for SettlementReverted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRevertedData {
    /// Why the settlement was rolled back.
    pub reason: String,

    /// When the rollback happened.
    pub reverted_at: DateTime<Utc>,
}

// Convenience constructors for events
impl ProfitEvent {
    /// Creates a ProfitRecorded event from order facts and a breakdown.
    pub fn profit_recorded(
        order_id: OrderId,
        employee_id: EmployeeId,
        seller_role: SellerRole,
        delivery_fee: Money,
        breakdown: ProfitBreakdown,
        sold_at: DateTime<Utc>,
    ) -> Self {
        ProfitEvent::ProfitRecorded(ProfitRecordedData {
            order_id,
            employee_id,
            seller_role,
            revenue: breakdown.revenue_excl_delivery,
            delivery_fee,
            total_cost: breakdown.total_cost,
            total_profit: breakdown.total_profit,
            employee_profit: breakdown.employee_profit,
            system_profit: breakdown.system_profit,
            sold_at,
            recorded_at: Utc::now(),
        })
    }

    /// Creates a ProfitSettled event.
    pub fn profit_settled(
        invoice_id: AggregateId,
        settled_at: DateTime<Utc>,
        amount: Money,
    ) -> Self {
        ProfitEvent::ProfitSettled(ProfitSettledData {
            invoice_id,
            settled_at,
            amount,
        })
    }

    /// Creates a SettlementReverted event.
    pub fn settlement_reverted(reason: impl Into<String>) -> Self {
        ProfitEvent::SettlementReverted(SettlementRevertedData {
            reason: reason.into(),
            reverted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> ProfitBreakdown {
        ProfitBreakdown {
            total_cost: Money::from_cents(27_000),
            revenue_excl_delivery: Money::from_cents(45_000),
            total_profit: Money::from_cents(18_000),
            employee_profit: Money::from_cents(5_400),
            system_profit: Money::from_cents(12_600),
        }
    }

    #[test]
    fn test_event_type() {
        let event = ProfitEvent::profit_recorded(
            OrderId::new(),
            EmployeeId::new(),
            SellerRole::Employee,
            Money::from_cents(5_000),
            breakdown(),
            Utc::now(),
        );
        assert_eq!(event.event_type(), "ProfitRecorded");

        let event =
            ProfitEvent::profit_settled(AggregateId::new(), Utc::now(), Money::from_cents(5_400));
        assert_eq!(event.event_type(), "ProfitSettled");

        let event = ProfitEvent::settlement_reverted("compensation");
        assert_eq!(event.event_type(), "SettlementReverted");
    }

    #[test]
    fn test_profit_recorded_serialization() {
        let order_id = OrderId::new();
        let event = ProfitEvent::profit_recorded(
            order_id,
            EmployeeId::new(),
            SellerRole::Employee,
            Money::from_cents(5_000),
            breakdown(),
            Utc::now(),
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ProfitEvent = serde_json::from_str(&json).unwrap();

        if let ProfitEvent::ProfitRecorded(data) = deserialized {
            assert_eq!(data.order_id, order_id);
            assert_eq!(data.revenue.cents(), 45_000);
            assert_eq!(data.employee_profit.cents(), 5_400);
            assert_eq!(data.system_profit.cents(), 12_600);
        } else {
            panic!("Expected ProfitRecorded event");
        }
    }
}
