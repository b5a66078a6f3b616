//! Cash account domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::DomainEvent;
use crate::money::Money;

/// Direction of a cash movement relative to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementDirection {
    /// Money entering the account.
    In,

    /// Money leaving the account.
    Out,
}

impl std::fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementDirection::In => write!(f, "in"),
            MovementDirection::Out => write!(f, "out"),
        }
    }
}

/// What a cash movement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Initial balance recorded when the account was opened.
    OpeningBalance,

    /// Owner put money into the account.
    CapitalInjection,

    /// Owner took money out of the account.
    CapitalWithdrawal,

    /// Payment for a purchase invoice.
    Purchase,

    /// Reversal of a purchase payment.
    PurchaseReversal,

    /// Payout of settled employee dues.
    Settlement,

    /// Reversal of a settlement payout.
    SettlementReversal,

    /// Manual correction.
    Adjustment,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceKind::OpeningBalance => "opening_balance",
            ReferenceKind::CapitalInjection => "capital_injection",
            ReferenceKind::CapitalWithdrawal => "capital_withdrawal",
            ReferenceKind::Purchase => "purchase",
            ReferenceKind::PurchaseReversal => "purchase_reversal",
            ReferenceKind::Settlement => "settlement",
            ReferenceKind::SettlementReversal => "settlement_reversal",
            ReferenceKind::Adjustment => "adjustment",
        };
        write!(f, "{}", s)
    }
}

/// Events that can occur on a cash account aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    /// Account was opened.
    AccountOpened(AccountOpenedData),

    /// A cash movement was recorded.
    MovementRecorded(MovementRecordedData),

    /// Account was deactivated.
    AccountDeactivated(AccountDeactivatedData),
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened(_) => "AccountOpened",
            AccountEvent::MovementRecorded(_) => "MovementRecorded",
            AccountEvent::AccountDeactivated(_) => "AccountDeactivated",
        }
    }
}

/// Data for AccountOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOpenedData {
    /// The unique account ID.
    pub account_id: AggregateId,

    /// Human-readable account name.
    pub name: String,

    /// Whether the account may go below zero.
    pub allow_overdraft: bool,

    /// When the account was opened.
    pub opened_at: DateTime<Utc>,
}

/// Data for MovementRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecordedData {
    /// Unique identifier for this movement.
    pub movement_id: Uuid,

    /// Amount moved. Always positive; direction carries the sign.
    pub amount: Money,

    /// Whether money entered or left the account.
    pub direction: MovementDirection,

    /// What the movement refers to.
    pub reference: ReferenceKind,

    /// External reference identifier (invoice number, settlement ID).
    pub reference_id: Option<String>,

    /// Free-text description.
    pub description: String,

    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Data for AccountDeactivated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDeactivatedData {
    /// When the account was deactivated.
    pub deactivated_at: DateTime<Utc>,

    /// Reason for deactivation.
    pub reason: Option<String>,
}

// Convenience constructors for events
impl AccountEvent {
    /// Creates an AccountOpened event.
    pub fn account_opened(
        account_id: AggregateId,
        name: impl Into<String>,
        allow_overdraft: bool,
    ) -> Self {
        AccountEvent::AccountOpened(AccountOpenedData {
            account_id,
            name: name.into(),
            allow_overdraft,
            opened_at: Utc::now(),
        })
    }

    /// Creates a MovementRecorded event.
    pub fn movement_recorded(
        amount: Money,
        direction: MovementDirection,
        reference: ReferenceKind,
        reference_id: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        AccountEvent::MovementRecorded(MovementRecordedData {
            movement_id: Uuid::new_v4(),
            amount,
            direction,
            reference,
            reference_id,
            description: description.into(),
            recorded_at: Utc::now(),
        })
    }

    /// Creates an AccountDeactivated event.
    pub fn account_deactivated(reason: Option<String>) -> Self {
        AccountEvent::AccountDeactivated(AccountDeactivatedData {
            deactivated_at: Utc::now(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let account_id = AggregateId::new();

        let event = AccountEvent::account_opened(account_id, "Operating", false);
        assert_eq!(event.event_type(), "AccountOpened");

        let event = AccountEvent::movement_recorded(
            Money::from_cents(1000),
            MovementDirection::In,
            ReferenceKind::CapitalInjection,
            None,
            "Initial funding",
        );
        assert_eq!(event.event_type(), "MovementRecorded");

        let event = AccountEvent::account_deactivated(Some("Closed".to_string()));
        assert_eq!(event.event_type(), "AccountDeactivated");
    }

    #[test]
    fn test_event_serialization() {
        let account_id = AggregateId::new();
        let event = AccountEvent::account_opened(account_id, "Operating", true);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("AccountOpened"));

        let deserialized: AccountEvent = serde_json::from_str(&json).unwrap();
        if let AccountEvent::AccountOpened(data) = deserialized {
            assert_eq!(data.account_id, account_id);
            assert_eq!(data.name, "Operating");
            assert!(data.allow_overdraft);
        } else {
            panic!("Expected AccountOpened event");
        }
    }

    #[test]
    fn test_movement_recorded_serialization() {
        let event = AccountEvent::movement_recorded(
            Money::from_cents(5000),
            MovementDirection::Out,
            ReferenceKind::Purchase,
            Some("INV-001".to_string()),
            "Supplier payment",
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: AccountEvent = serde_json::from_str(&json).unwrap();

        if let AccountEvent::MovementRecorded(data) = deserialized {
            assert_eq!(data.amount.cents(), 5000);
            assert_eq!(data.direction, MovementDirection::Out);
            assert_eq!(data.reference, ReferenceKind::Purchase);
            assert_eq!(data.reference_id, Some("INV-001".to_string()));
            assert_eq!(data.description, "Supplier payment");
        } else {
            panic!("Expected MovementRecorded event");
        }
    }

    #[test]
    fn test_reference_kind_display() {
        assert_eq!(ReferenceKind::OpeningBalance.to_string(), "opening_balance");
        assert_eq!(ReferenceKind::Settlement.to_string(), "settlement");
        assert_eq!(
            ReferenceKind::PurchaseReversal.to_string(),
            "purchase_reversal"
        );
    }
}
