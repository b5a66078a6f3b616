//! Cash account aggregate implementation.

use common::AggregateId;
use journal::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    AccountError, AccountEvent, MovementDirection, ReferenceKind,
    events::{AccountOpenedData, MovementRecordedData},
};

/// Cash account aggregate root.
///
/// Tracks a single cash account as an append-only log of movements. The
/// balance is never stored; it is always recomputed by replaying the log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashAccount {
    /// Unique account identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Human-readable account name.
    name: String,

    /// Whether the account may go below zero.
    allow_overdraft: bool,

    /// Whether the account accepts new movements.
    is_active: bool,

    /// Running balance derived from applied movements.
    balance: Money,

    /// Number of movements applied so far.
    movement_count: usize,
}

impl Aggregate for CashAccount {
    type Event = AccountEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "CashAccount"
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
            AccountEvent::AccountOpened(data) => self.apply_account_opened(data),
            AccountEvent::MovementRecorded(data) => self.apply_movement_recorded(data),
            AccountEvent::AccountDeactivated(_) => {
                self.is_active = false;
            }
        }
    }
}

// Query methods
impl CashAccount {
    /// Returns the account name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the account may go below zero.
    pub fn allow_overdraft(&self) -> bool {
        self.allow_overdraft
    }

    /// Returns true if the account accepts new movements.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the current balance.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Returns the number of movements recorded on this account.
    pub fn movement_count(&self) -> usize {
        self.movement_count
    }
}

// Command methods (return events)
impl CashAccount {
    /// Opens the account.
    ///
    /// If an initial balance is given, an opening movement is emitted
    /// alongside the open event so the balance stays derivable from
    /// movements alone.
    pub fn open(
        &self,
        account_id: AggregateId,
        name: impl Into<String>,
        allow_overdraft: bool,
        initial_balance: Money,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        if self.id.is_some() {
            return Err(AccountError::AlreadyOpened);
        }

        let name = name.into();
        if name.trim().is_empty() {
            return Err(AccountError::NameRequired);
        }

        if initial_balance.is_negative() {
            return Err(AccountError::InvalidAmount {
                amount: initial_balance.cents(),
            });
        }

        let mut events = vec![AccountEvent::account_opened(
            account_id,
            name,
            allow_overdraft,
        )];

        if initial_balance.is_positive() {
            events.push(AccountEvent::movement_recorded(
                initial_balance,
                MovementDirection::In,
                ReferenceKind::OpeningBalance,
                None,
                "Opening balance",
            ));
        }

        Ok(events)
    }

    /// Records a cash movement on the account.
    pub fn record_movement(
        &self,
        amount: Money,
        direction: MovementDirection,
        reference: ReferenceKind,
        reference_id: Option<String>,
        description: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        if self.id.is_none() {
            return Err(AccountError::NotOpen);
        }

        if !self.is_active {
            return Err(AccountError::Inactive);
        }

        if !amount.is_positive() {
            return Err(AccountError::InvalidAmount {
                amount: amount.cents(),
            });
        }

        if direction == MovementDirection::Out
            && !self.allow_overdraft
            && (self.balance - amount).is_negative()
        {
            return Err(AccountError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }

        Ok(vec![AccountEvent::movement_recorded(
            amount,
            direction,
            reference,
            reference_id,
            description,
        )])
    }

    /// Deactivates the account.
    pub fn deactivate(&self, reason: Option<String>) -> Result<Vec<AccountEvent>, AccountError> {
        if self.id.is_none() {
            return Err(AccountError::NotOpen);
        }

        if !self.is_active {
            return Err(AccountError::Inactive);
        }

        Ok(vec![AccountEvent::account_deactivated(reason)])
    }
}

// Apply event helpers
impl CashAccount {
    fn apply_account_opened(&mut self, data: AccountOpenedData) {
        self.id = Some(data.account_id);
        self.name = data.name;
        self.allow_overdraft = data.allow_overdraft;
        self.is_active = true;
    }

    fn apply_movement_recorded(&mut self, data: MovementRecordedData) {
        match data.direction {
            MovementDirection::In => self.balance += data.amount,
            MovementDirection::Out => self.balance -= data.amount,
        }
        self.movement_count += 1;
    }
}
