//! Profit records read model — per-order profit shares and settlement state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use domain::profit::profit_stream_id;
use domain::{Money, ProfitEvent, ProfitStatus, SellerRole};
use journal::JournalEntry;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Summary of one order's profit record.
#[derive(Debug, Clone, Serialize)]
pub struct ProfitRecordSummary {
    pub order_id: OrderId,
    pub employee_id: EmployeeId,
    pub seller_role: SellerRole,
    pub revenue: Money,
    pub delivery_fee: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    pub employee_profit: Money,
    pub system_profit: Money,
    pub sold_at: DateTime<Utc>,
    pub status: ProfitStatus,
    pub settled_at: Option<DateTime<Utc>>,
    pub invoice_id: Option<AggregateId>,
}

/// Read model view of profit records, keyed by order.
#[derive(Clone)]
pub struct ProfitRecordsView {
    records: Arc<RwLock<HashMap<AggregateId, ProfitRecordSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl ProfitRecordsView {
    /// Creates a new empty profit records view.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Gets the profit record for an order.
    pub async fn get_record(&self, order_id: OrderId) -> Option<ProfitRecordSummary> {
        self.records
            .read()
            .await
            .get(&profit_stream_id(order_id))
            .cloned()
    }

    /// Gets all pending records for an employee, newest sale first.
    pub async fn pending_for(&self, employee_id: EmployeeId) -> Vec<ProfitRecordSummary> {
        let mut records: Vec<ProfitRecordSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.employee_id == employee_id && r.status == ProfitStatus::Pending)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.sold_at.cmp(&a.sold_at));
        records
    }

    /// Gets all settled records regardless of owner, newest settlement first.
    pub async fn settled_records(&self) -> Vec<ProfitRecordSummary> {
        let mut records: Vec<ProfitRecordSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == ProfitStatus::Settled)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        records
    }

    /// Gets all settled records for an employee, newest settlement first.
    pub async fn settled_for(&self, employee_id: EmployeeId) -> Vec<ProfitRecordSummary> {
        let mut records: Vec<ProfitRecordSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.employee_id == employee_id && r.status == ProfitStatus::Settled)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        records
    }

    /// Sum of unsettled employee shares for an employee.
    pub async fn total_pending_dues(&self, employee_id: EmployeeId) -> Money {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.employee_id == employee_id && r.status == ProfitStatus::Pending)
            .map(|r| r.employee_profit)
            .sum()
    }
}

impl Default for ProfitRecordsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for ProfitRecordsView {
    fn name(&self) -> &'static str {
        "ProfitRecordsView"
    }

    async fn handle(&self, entry: &JournalEntry) -> Result<()> {
        if entry.aggregate_type != "ProfitRecord" {
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            return Ok(());
        }

        let profit_event: ProfitEvent = serde_json::from_value(entry.payload.clone())?;
        let stream_id = entry.aggregate_id;

        let mut records = self.records.write().await;

        match profit_event {
            ProfitEvent::ProfitRecorded(data) => {
                records.insert(
                    stream_id,
                    ProfitRecordSummary {
                        order_id: data.order_id,
                        employee_id: data.employee_id,
                        seller_role: data.seller_role,
                        revenue: data.revenue,
                        delivery_fee: data.delivery_fee,
                        total_cost: data.total_cost,
                        total_profit: data.total_profit,
                        employee_profit: data.employee_profit,
                        system_profit: data.system_profit,
                        sold_at: data.sold_at,
                        status: ProfitStatus::Pending,
                        settled_at: None,
                        invoice_id: None,
                    },
                );
            }
            ProfitEvent::ProfitSettled(data) => {
                if let Some(record) = records.get_mut(&stream_id) {
                    record.status = ProfitStatus::Settled;
                    record.settled_at = Some(data.settled_at);
                    record.invoice_id = Some(data.invoice_id);
                }
            }
            ProfitEvent::SettlementReverted(_) => {
                if let Some(record) = records.get_mut(&stream_id) {
                    record.status = ProfitStatus::Pending;
                    record.settled_at = None;
                    record.invoice_id = None;
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
        self.records.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for ProfitRecordsView {
    fn name(&self) -> &'static str {
        "ProfitRecordsView"
    }

    fn count(&self) -> usize {
        self.records.try_read().map(|r| r.len()).unwrap_or(0)
    }
}
