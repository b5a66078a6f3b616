//! Ledger service providing a simplified API for cash account operations.

use chrono::{DateTime, Utc};
use common::AggregateId;
use journal::{Journal, JournalError};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::money::Money;

use super::{
    AccountEvent, CashAccount, DeactivateAccount, MovementDirection, OpenAccount, RecordMovement,
    ReferenceKind,
};

impl From<super::AccountError> for DomainError {
    fn from(e: super::AccountError) -> Self {
        DomainError::Account(e)
    }
}

/// Number of times a movement is retried after a concurrency conflict.
const MAX_APPEND_RETRIES: usize = 3;

/// A recorded cash movement, as returned from queries.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Unique identifier for this movement.
    pub movement_id: Uuid,

    /// The account the movement belongs to.
    pub account_id: AggregateId,

    /// Amount moved. Always positive; direction carries the sign.
    pub amount: Money,

    /// Whether money entered or left the account.
    pub direction: MovementDirection,

    /// What the movement refers to.
    pub reference: ReferenceKind,

    /// External reference identifier.
    pub reference_id: Option<String>,

    /// Free-text description.
    pub description: String,

    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Service for managing cash accounts.
///
/// Provides a high-level API for ledger operations, wrapping the command
/// handler. Balances are never cached; every read replays the account's
/// journal entries.
pub struct LedgerService<J: Journal> {
    handler: CommandHandler<J, CashAccount>,
}

impl<J: Journal> LedgerService<J> {
    /// Creates a new ledger service with the given journal.
    pub fn new(journal: J) -> Self {
        Self {
            handler: CommandHandler::new(journal),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<J, CashAccount> {
        &self.handler
    }

    /// Opens a cash account.
    #[tracing::instrument(skip(self))]
    pub async fn open_account(
        &self,
        cmd: OpenAccount,
    ) -> Result<CommandResult<CashAccount>, DomainError> {
        let account_id = cmd.account_id;
        let name = cmd.name.clone();
        let allow_overdraft = cmd.allow_overdraft;
        let initial_balance = cmd.initial_balance;

        self.handler
            .execute(account_id, |account| {
                account.open(account_id, name, allow_overdraft, initial_balance)
            })
            .await
    }

    /// Records a cash movement on an account.
    ///
    /// Concurrent writers race on the account's version. A conflict means
    /// another movement landed between load and append, so the command is
    /// retried against the fresh state, up to a small bound.
    #[tracing::instrument(skip(self))]
    pub async fn record_movement(
        &self,
        cmd: RecordMovement,
    ) -> Result<CommandResult<CashAccount>, DomainError> {
        let mut attempt = 0;
        loop {
            let amount = cmd.amount;
            let direction = cmd.direction;
            let reference = cmd.reference;
            let reference_id = cmd.reference_id.clone();
            let description = cmd.description.clone();

            let result = self
                .handler
                .execute(cmd.account_id, |account| {
                    account.record_movement(
                        amount,
                        direction,
                        reference,
                        reference_id,
                        description,
                    )
                })
                .await;

            match result {
                Err(DomainError::Journal(JournalError::ConcurrencyConflict { .. }))
                    if attempt < MAX_APPEND_RETRIES =>
                {
                    attempt += 1;
                    tracing::debug!(
                        account_id = %cmd.account_id,
                        attempt,
                        "movement hit concurrency conflict, retrying"
                    );
                }
                other => return other,
            }
        }
    }

    /// Deactivates a cash account.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_account(
        &self,
        cmd: DeactivateAccount,
    ) -> Result<CommandResult<CashAccount>, DomainError> {
        let reason = cmd.reason.clone();

        self.handler
            .execute(cmd.account_id, |account| account.deactivate(reason))
            .await
    }

    /// Loads an account by ID.
    ///
    /// Returns None if the account doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_account(
        &self,
        account_id: AggregateId,
    ) -> Result<Option<CashAccount>, DomainError> {
        self.handler.load_existing(account_id).await
    }

    /// Returns the current balance of an account.
    ///
    /// The balance is recomputed from the movement log on every call.
    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, account_id: AggregateId) -> Result<Money, DomainError> {
        let account = self.handler.load_existing(account_id).await?.ok_or(
            DomainError::AggregateNotFound {
                aggregate_type: CashAccount::aggregate_type(),
                aggregate_id: account_id.to_string(),
            },
        )?;

        Ok(account.balance())
    }

    /// Lists movements on an account, newest first.
    ///
    /// If a limit is given, only the most recent movements are returned.
    #[tracing::instrument(skip(self))]
    pub async fn list_movements(
        &self,
        account_id: AggregateId,
        limit: Option<usize>,
    ) -> Result<Vec<Movement>, DomainError> {
        let entries = self
            .handler
            .journal()
            .entries_for_aggregate(account_id)
            .await?;

        if entries.is_empty() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: CashAccount::aggregate_type(),
                aggregate_id: account_id.to_string(),
            });
        }

        let mut movements = Vec::new();
        for entry in entries {
            let event: AccountEvent = serde_json::from_value(entry.payload)?;
            if let AccountEvent::MovementRecorded(data) = event {
                movements.push(Movement {
                    movement_id: data.movement_id,
                    account_id,
                    amount: data.amount,
                    direction: data.direction,
                    reference: data.reference,
                    reference_id: data.reference_id,
                    description: data.description,
                    recorded_at: data.recorded_at,
                });
            }
        }

        movements.reverse();
        if let Some(limit) = limit {
            movements.truncate(limit);
        }

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal::InMemoryJournal;

    fn service() -> LedgerService<InMemoryJournal> {
        LedgerService::new(InMemoryJournal::new())
    }

    #[tokio::test]
    async fn test_open_account() {
        let service = service();

        let cmd = OpenAccount::with_name("Operating", Money::from_cents(1_000_000));
        let account_id = cmd.account_id;
        let result = service.open_account(cmd).await.unwrap();

        assert_eq!(result.aggregate.id(), Some(account_id));
        assert_eq!(result.aggregate.balance().cents(), 1_000_000);
        assert_eq!(result.events.len(), 2);
    }

    #[tokio::test]
    async fn test_record_movement_and_balance() {
        let service = service();

        let cmd = OpenAccount::with_name("Operating", Money::from_cents(10_000));
        let account_id = cmd.account_id;
        service.open_account(cmd).await.unwrap();

        service
            .record_movement(
                RecordMovement::outgoing(
                    account_id,
                    Money::from_cents(4_000),
                    ReferenceKind::Purchase,
                    "Supplier payment",
                )
                .with_reference_id("INV-001"),
            )
            .await
            .unwrap();

        let balance = service.get_balance(account_id).await.unwrap();
        assert_eq!(balance.cents(), 6_000);
    }

    #[tokio::test]
    async fn test_insufficient_funds_rejected() {
        let service = service();

        let cmd = OpenAccount::with_name("Operating", Money::from_cents(1_000));
        let account_id = cmd.account_id;
        service.open_account(cmd).await.unwrap();

        let result = service
            .record_movement(RecordMovement::outgoing(
                account_id,
                Money::from_cents(1_500),
                ReferenceKind::Purchase,
                "Too much",
            ))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Account(
                super::super::AccountError::InsufficientFunds { .. }
            ))
        ));

        // Balance unchanged
        let balance = service.get_balance(account_id).await.unwrap();
        assert_eq!(balance.cents(), 1_000);
    }

    #[tokio::test]
    async fn test_get_balance_unknown_account() {
        let service = service();
        let result = service.get_balance(AggregateId::new()).await;
        assert!(matches!(
            result,
            Err(DomainError::AggregateNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_movements_newest_first() {
        let service = service();

        let cmd = OpenAccount::with_name("Operating", Money::from_cents(10_000));
        let account_id = cmd.account_id;
        service.open_account(cmd).await.unwrap();

        service
            .record_movement(RecordMovement::incoming(
                account_id,
                Money::from_cents(100),
                ReferenceKind::CapitalInjection,
                "First",
            ))
            .await
            .unwrap();
        service
            .record_movement(RecordMovement::outgoing(
                account_id,
                Money::from_cents(50),
                ReferenceKind::Purchase,
                "Second",
            ))
            .await
            .unwrap();

        let movements = service.list_movements(account_id, None).await.unwrap();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[0].description, "Second");
        assert_eq!(movements[1].description, "First");
        assert_eq!(movements[2].description, "Opening balance");

        let limited = service.list_movements(account_id, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].description, "Second");
    }

    #[tokio::test]
    async fn test_list_movements_unknown_account() {
        let service = service();
        let result = service.list_movements(AggregateId::new(), None).await;
        assert!(matches!(
            result,
            Err(DomainError::AggregateNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_account() {
        let service = service();

        let cmd = OpenAccount::with_name("Operating", Money::zero());
        let account_id = cmd.account_id;
        service.open_account(cmd).await.unwrap();

        let result = service
            .deactivate_account(DeactivateAccount::new(
                account_id,
                Some("Closed".to_string()),
            ))
            .await
            .unwrap();

        assert!(!result.aggregate.is_active());
    }

    #[tokio::test]
    async fn test_concurrent_movements_all_land() {
        use std::sync::Arc;

        let journal = InMemoryJournal::new();
        let service = Arc::new(LedgerService::new(journal));

        let cmd = OpenAccount::new(
            AggregateId::new(),
            "Operating",
            true,
            Money::from_cents(100_000),
        );
        let account_id = cmd.account_id;
        service.open_account(cmd).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..3 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .record_movement(RecordMovement::outgoing(
                        account_id,
                        Money::from_cents(1_000),
                        ReferenceKind::Adjustment,
                        format!("Concurrent {}", i),
                    ))
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let balance = service.get_balance(account_id).await.unwrap();
        assert_eq!(balance.cents(), 97_000);
    }
}
