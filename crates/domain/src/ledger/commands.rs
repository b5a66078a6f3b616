//! Cash account commands.

use common::AggregateId;

use crate::command::Command;
use crate::money::Money;

use super::{CashAccount, MovementDirection, ReferenceKind};

/// Command to open a cash account.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    /// The account ID to create.
    pub account_id: AggregateId,

    /// Human-readable account name.
    pub name: String,

    /// Whether the account may go below zero.
    pub allow_overdraft: bool,

    /// Initial balance, recorded as an opening movement if positive.
    pub initial_balance: Money,
}

impl OpenAccount {
    /// Creates a new OpenAccount command.
    pub fn new(
        account_id: AggregateId,
        name: impl Into<String>,
        allow_overdraft: bool,
        initial_balance: Money,
    ) -> Self {
        Self {
            account_id,
            name: name.into(),
            allow_overdraft,
            initial_balance,
        }
    }

    /// Creates a new OpenAccount command with a generated account ID.
    pub fn with_name(name: impl Into<String>, initial_balance: Money) -> Self {
        Self {
            account_id: AggregateId::new(),
            name: name.into(),
            allow_overdraft: false,
            initial_balance,
        }
    }
}

impl Command for OpenAccount {
    type Aggregate = CashAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }
}

/// Command to record a cash movement on an account.
#[derive(Debug, Clone)]
pub struct RecordMovement {
    /// The account to record the movement on.
    pub account_id: AggregateId,

    /// Amount moved. Must be positive.
    pub amount: Money,

    /// Whether money enters or leaves the account.
    pub direction: MovementDirection,

    /// What the movement refers to.
    pub reference: ReferenceKind,

    /// External reference identifier.
    pub reference_id: Option<String>,

    /// Free-text description.
    pub description: String,
}

impl RecordMovement {
    /// Creates a new RecordMovement command.
    pub fn new(
        account_id: AggregateId,
        amount: Money,
        direction: MovementDirection,
        reference: ReferenceKind,
        reference_id: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount,
            direction,
            reference,
            reference_id,
            description: description.into(),
        }
    }

    /// Creates an incoming movement command.
    pub fn incoming(
        account_id: AggregateId,
        amount: Money,
        reference: ReferenceKind,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            account_id,
            amount,
            MovementDirection::In,
            reference,
            None,
            description,
        )
    }

    /// Creates an outgoing movement command.
    pub fn outgoing(
        account_id: AggregateId,
        amount: Money,
        reference: ReferenceKind,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            account_id,
            amount,
            MovementDirection::Out,
            reference,
            None,
            description,
        )
    }

    /// Attaches an external reference identifier.
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }
}

impl Command for RecordMovement {
    type Aggregate = CashAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }
}

/// Command to deactivate a cash account.
#[derive(Debug, Clone)]
pub struct DeactivateAccount {
    /// The account to deactivate.
    pub account_id: AggregateId,

    /// Reason for deactivation.
    pub reason: Option<String>,
}

impl DeactivateAccount {
    /// Creates a new DeactivateAccount command.
    pub fn new(account_id: AggregateId, reason: Option<String>) -> Self {
        Self { account_id, reason }
    }
}

impl Command for DeactivateAccount {
    type Aggregate = CashAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_account_command() {
        let account_id = AggregateId::new();
        let cmd = OpenAccount::new(account_id, "Operating", false, Money::from_cents(10_000));

        assert_eq!(cmd.aggregate_id(), account_id);
        assert_eq!(cmd.name, "Operating");
        assert_eq!(cmd.initial_balance.cents(), 10_000);
    }

    #[test]
    fn test_open_account_with_name() {
        let cmd = OpenAccount::with_name("Petty cash", Money::zero());
        assert_eq!(cmd.name, "Petty cash");
        assert!(!cmd.allow_overdraft);
    }

    #[test]
    fn test_record_movement_helpers() {
        let account_id = AggregateId::new();

        let cmd = RecordMovement::incoming(
            account_id,
            Money::from_cents(500),
            ReferenceKind::CapitalInjection,
            "Funding",
        );
        assert_eq!(cmd.direction, MovementDirection::In);
        assert!(cmd.reference_id.is_none());

        let cmd = RecordMovement::outgoing(
            account_id,
            Money::from_cents(500),
            ReferenceKind::Purchase,
            "Payment",
        )
        .with_reference_id("INV-001");
        assert_eq!(cmd.direction, MovementDirection::Out);
        assert_eq!(cmd.reference_id, Some("INV-001".to_string()));
    }
}
