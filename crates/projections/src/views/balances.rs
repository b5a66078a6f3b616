//! Account balances read model — one row per cash account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountEvent, Money, MovementDirection};
use journal::JournalEntry;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Summary of a cash account in the balances view.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalanceSummary {
    pub account_id: AggregateId,
    pub name: String,
    pub allow_overdraft: bool,
    pub is_active: bool,
    pub balance: Money,
    pub movement_count: u64,
    pub updated_at: DateTime<Utc>,
}

/// Read model view of current account balances.
///
/// The journal stays authoritative; this view is a denormalized mirror
/// that can always be rebuilt by replaying the movement log.
#[derive(Clone)]
pub struct AccountBalancesView {
    accounts: Arc<RwLock<HashMap<AggregateId, AccountBalanceSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl AccountBalancesView {
    /// Creates a new empty balances view.
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Gets the summary of a specific account.
    pub async fn get_account(&self, account_id: AggregateId) -> Option<AccountBalanceSummary> {
        self.accounts.read().await.get(&account_id).cloned()
    }

    /// Gets all accounts.
    pub async fn get_all_accounts(&self) -> Vec<AccountBalanceSummary> {
        self.accounts.read().await.values().cloned().collect()
    }

    /// Returns the sum of all active account balances.
    pub async fn total_balance(&self) -> Money {
        self.accounts
            .read()
            .await
            .values()
            .filter(|account| account.is_active)
            .map(|account| account.balance)
            .sum()
    }
}

impl Default for AccountBalancesView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AccountBalancesView {
    fn name(&self) -> &'static str {
        "AccountBalancesView"
    }

    async fn handle(&self, entry: &JournalEntry) -> Result<()> {
        if entry.aggregate_type != "CashAccount" {
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            return Ok(());
        }

        let account_event: AccountEvent = serde_json::from_value(entry.payload.clone())?;
        let account_id = entry.aggregate_id;

        let mut accounts = self.accounts.write().await;

        match account_event {
            AccountEvent::AccountOpened(data) => {
                accounts.insert(
                    account_id,
                    AccountBalanceSummary {
                        account_id,
                        name: data.name,
                        allow_overdraft: data.allow_overdraft,
                        is_active: true,
                        balance: Money::zero(),
                        movement_count: 0,
                        updated_at: data.opened_at,
                    },
                );
            }
            AccountEvent::MovementRecorded(data) => {
                if let Some(account) = accounts.get_mut(&account_id) {
                    match data.direction {
                        MovementDirection::In => account.balance += data.amount,
                        MovementDirection::Out => account.balance -= data.amount,
                    }
                    account.movement_count += 1;
                    account.updated_at = data.recorded_at;
                }
            }
            AccountEvent::AccountDeactivated(data) => {
                if let Some(account) = accounts.get_mut(&account_id) {
                    account.is_active = false;
                    account.updated_at = data.deactivated_at;
                }
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.accounts.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AccountBalancesView {
    fn name(&self) -> &'static str {
        "AccountBalancesView"
    }

    fn count(&self) -> usize {
        // Use try_read to avoid blocking; returns 0 if lock is held
        self.accounts.try_read().map(|a| a.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ReferenceKind;
    use journal::Version;

    fn make_entry(aggregate_id: AggregateId, version: i64, event: &AccountEvent) -> JournalEntry {
        JournalEntry::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("CashAccount")
            .entry_type(domain::DomainEvent::event_type(event))
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn test_account_opened() {
        let view = AccountBalancesView::new();
        let account_id = AggregateId::new();

        let event = AccountEvent::account_opened(account_id, "Operating", false);
        view.handle(&make_entry(account_id, 1, &event))
            .await
            .unwrap();

        let account = view.get_account(account_id).await.unwrap();
        assert_eq!(account.name, "Operating");
        assert!(account.is_active);
        assert_eq!(account.balance, Money::zero());
    }

    #[tokio::test]
    async fn test_movements_update_balance() {
        let view = AccountBalancesView::new();
        let account_id = AggregateId::new();

        let event = AccountEvent::account_opened(account_id, "Operating", false);
        view.handle(&make_entry(account_id, 1, &event))
            .await
            .unwrap();

        let event = AccountEvent::movement_recorded(
            Money::from_cents(10_000),
            MovementDirection::In,
            ReferenceKind::OpeningBalance,
            None,
            "Opening balance",
        );
        view.handle(&make_entry(account_id, 2, &event))
            .await
            .unwrap();

        let event = AccountEvent::movement_recorded(
            Money::from_cents(4_000),
            MovementDirection::Out,
            ReferenceKind::Purchase,
            Some("PI-0001".to_string()),
            "Supplier payment",
        );
        view.handle(&make_entry(account_id, 3, &event))
            .await
            .unwrap();

        let account = view.get_account(account_id).await.unwrap();
        assert_eq!(account.balance.cents(), 6_000);
        assert_eq!(account.movement_count, 2);
    }

    #[tokio::test]
    async fn test_deactivation_excluded_from_total() {
        let view = AccountBalancesView::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        for (account_id, name) in [(first, "Operating"), (second, "Petty cash")] {
            let event = AccountEvent::account_opened(account_id, name, false);
            view.handle(&make_entry(account_id, 1, &event))
                .await
                .unwrap();
            let event = AccountEvent::movement_recorded(
                Money::from_cents(5_000),
                MovementDirection::In,
                ReferenceKind::OpeningBalance,
                None,
                "Opening balance",
            );
            view.handle(&make_entry(account_id, 2, &event))
                .await
                .unwrap();
        }

        assert_eq!(view.total_balance().await.cents(), 10_000);

        let event = AccountEvent::account_deactivated(Some("Closed".to_string()));
        view.handle(&make_entry(second, 3, &event)).await.unwrap();

        assert_eq!(view.total_balance().await.cents(), 5_000);
        assert!(!view.get_account(second).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_skips_other_aggregate_types() {
        let view = AccountBalancesView::new();

        let entry = JournalEntry::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("ProfitRecord")
            .entry_type("ProfitRecorded")
            .version(Version::new(1))
            .payload_raw(serde_json::json!({"test": true}))
            .build();

        view.handle(&entry).await.unwrap();
        assert_eq!(view.get_all_accounts().await.len(), 0);
        assert_eq!(view.position().await.entries_processed, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let view = AccountBalancesView::new();
        let account_id = AggregateId::new();

        let event = AccountEvent::account_opened(account_id, "Operating", false);
        view.handle(&make_entry(account_id, 1, &event))
            .await
            .unwrap();

        assert_eq!(view.get_all_accounts().await.len(), 1);

        view.reset().await.unwrap();

        assert_eq!(view.get_all_accounts().await.len(), 0);
        assert_eq!(view.position().await.entries_processed, 0);
    }
}
