//! Invoice service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use domain::Money;

use crate::error::FlowError;
use crate::purchase::{PurchaseDraft, PurchaseLine};

/// A purchase invoice as stored by the invoice service.
#[derive(Debug, Clone)]
pub struct PurchaseInvoice {
    /// The invoice number assigned by the invoice service.
    pub invoice_id: String,
    /// Supplier name.
    pub supplier: String,
    /// Invoice lines.
    pub lines: Vec<PurchaseLine>,
    /// Shipping fee, zero when not charged.
    pub shipping_fee: Money,
    /// Bank transfer fee, zero when not charged.
    pub transfer_fee: Money,
    /// Sum of line quantities times unit costs.
    pub goods_total: Money,
    /// Goods total plus fees.
    pub total: Money,
    /// When the invoice was created.
    pub created_at: DateTime<Utc>,
    /// Whether the invoice has been deleted (reversed).
    pub deleted: bool,
}

/// A settlement invoice issued when employee dues are paid out.
#[derive(Debug, Clone)]
pub struct SettlementInvoice {
    /// Stable ID used to link settled profit records to this invoice.
    pub invoice_id: AggregateId,
    /// Human-facing invoice number ("RY-000001").
    pub number: String,
    /// The employee being paid.
    pub employee_id: EmployeeId,
    /// Sum of the employee profit shares covered by this invoice.
    pub total: Money,
    /// Orders covered by this invoice.
    pub order_ids: Vec<OrderId>,
    /// When the invoice was created.
    pub created_at: DateTime<Utc>,
    /// Whether the invoice has been voided by compensation.
    pub voided: bool,
}

/// Trait for invoice bookkeeping operations.
#[async_trait]
pub trait InvoiceService: Send + Sync {
    /// Creates a purchase invoice from a validated draft.
    async fn create_purchase(&self, draft: &PurchaseDraft) -> Result<PurchaseInvoice, FlowError>;

    /// Looks up a purchase invoice by number.
    async fn get_purchase(&self, invoice_id: &str) -> Result<Option<PurchaseInvoice>, FlowError>;

    /// Marks a purchase invoice as deleted.
    async fn mark_purchase_deleted(&self, invoice_id: &str) -> Result<(), FlowError>;

    /// Creates a settlement invoice for an employee payout.
    async fn create_settlement(
        &self,
        employee_id: EmployeeId,
        total: Money,
        order_ids: Vec<OrderId>,
    ) -> Result<SettlementInvoice, FlowError>;

    /// Voids a settlement invoice.
    async fn void_settlement(&self, number: &str) -> Result<(), FlowError>;

    /// Lists an employee's settlement invoices, newest first. Voided
    /// invoices are excluded.
    async fn list_settlements(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<SettlementInvoice>, FlowError>;
}

#[derive(Debug, Default)]
struct InMemoryInvoiceState {
    purchases: HashMap<String, PurchaseInvoice>,
    settlements: HashMap<String, SettlementInvoice>,
    next_purchase: u32,
    next_settlement: u32,
    fail_on_purchase: bool,
    fail_on_settlement: bool,
}

/// In-memory invoice service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceService {
    state: Arc<RwLock<InMemoryInvoiceState>>,
}

impl InMemoryInvoiceService {
    /// Creates a new in-memory invoice service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on the next purchase invoice creation.
    pub fn set_fail_on_purchase(&self, fail: bool) {
        self.state.write().unwrap().fail_on_purchase = fail;
    }

    /// Configures the service to fail on the next settlement invoice creation.
    pub fn set_fail_on_settlement(&self, fail: bool) {
        self.state.write().unwrap().fail_on_settlement = fail;
    }

    /// Returns the number of purchase invoices that are not deleted.
    pub fn active_purchase_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .purchases
            .values()
            .filter(|invoice| !invoice.deleted)
            .count()
    }

    /// Returns the number of settlement invoices that are not voided.
    pub fn active_settlement_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .settlements
            .values()
            .filter(|invoice| !invoice.voided)
            .count()
    }

    /// Looks up a settlement invoice by number.
    pub fn settlement(&self, number: &str) -> Option<SettlementInvoice> {
        self.state.read().unwrap().settlements.get(number).cloned()
    }
}

#[async_trait]
impl InvoiceService for InMemoryInvoiceService {
    async fn create_purchase(&self, draft: &PurchaseDraft) -> Result<PurchaseInvoice, FlowError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_purchase {
            return Err(FlowError::InvoiceService(
                "Invoice service unavailable".to_string(),
            ));
        }

        state.next_purchase += 1;
        let invoice_id = format!("PI-{:04}", state.next_purchase);
        let invoice = PurchaseInvoice {
            invoice_id: invoice_id.clone(),
            supplier: draft.supplier.clone(),
            lines: draft.lines.clone(),
            shipping_fee: draft.shipping_fee,
            transfer_fee: draft.transfer_fee,
            goods_total: draft.goods_total(),
            total: draft.total(),
            created_at: Utc::now(),
            deleted: false,
        };
        state.purchases.insert(invoice_id, invoice.clone());

        Ok(invoice)
    }

    async fn get_purchase(&self, invoice_id: &str) -> Result<Option<PurchaseInvoice>, FlowError> {
        Ok(self.state.read().unwrap().purchases.get(invoice_id).cloned())
    }

    async fn mark_purchase_deleted(&self, invoice_id: &str) -> Result<(), FlowError> {
        let mut state = self.state.write().unwrap();
        if let Some(invoice) = state.purchases.get_mut(invoice_id) {
            invoice.deleted = true;
        }
        Ok(())
    }

    async fn create_settlement(
        &self,
        employee_id: EmployeeId,
        total: Money,
        order_ids: Vec<OrderId>,
    ) -> Result<SettlementInvoice, FlowError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_settlement {
            return Err(FlowError::InvoiceService(
                "Invoice service unavailable".to_string(),
            ));
        }

        state.next_settlement += 1;
        let number = format!("RY-{:06}", state.next_settlement);
        let invoice = SettlementInvoice {
            invoice_id: AggregateId::new(),
            number: number.clone(),
            employee_id,
            total,
            order_ids,
            created_at: Utc::now(),
            voided: false,
        };
        state.settlements.insert(number, invoice.clone());

        Ok(invoice)
    }

    async fn void_settlement(&self, number: &str) -> Result<(), FlowError> {
        let mut state = self.state.write().unwrap();
        if let Some(invoice) = state.settlements.get_mut(number) {
            invoice.voided = true;
        }
        Ok(())
    }

    async fn list_settlements(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<SettlementInvoice>, FlowError> {
        let state = self.state.read().unwrap();
        let mut invoices: Vec<SettlementInvoice> = state
            .settlements
            .values()
            .filter(|invoice| invoice.employee_id == employee_id && !invoice.voided)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PurchaseDraft {
        PurchaseDraft::new("Acme Wholesale")
            .with_line("SKU-001", 10, Money::from_cents(5_000))
            .with_shipping_fee(Money::from_cents(15_000))
            .with_transfer_fee(Money::from_cents(5_000))
    }

    #[tokio::test]
    async fn test_create_and_get_purchase() {
        let service = InMemoryInvoiceService::new();

        let invoice = service.create_purchase(&draft()).await.unwrap();

        assert_eq!(invoice.invoice_id, "PI-0001");
        assert_eq!(invoice.goods_total, Money::from_cents(50_000));
        assert_eq!(invoice.total, Money::from_cents(70_000));
        assert!(!invoice.deleted);

        let fetched = service.get_purchase("PI-0001").await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(service.active_purchase_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_purchase_deleted() {
        let service = InMemoryInvoiceService::new();
        let invoice = service.create_purchase(&draft()).await.unwrap();

        service
            .mark_purchase_deleted(&invoice.invoice_id)
            .await
            .unwrap();

        let fetched = service.get_purchase(&invoice.invoice_id).await.unwrap();
        assert!(fetched.is_some_and(|invoice| invoice.deleted));
        assert_eq!(service.active_purchase_count(), 0);
    }

    #[tokio::test]
    async fn test_create_settlement_numbers() {
        let service = InMemoryInvoiceService::new();
        let employee = EmployeeId::new();

        let first = service
            .create_settlement(employee, Money::from_cents(540_000), vec![OrderId::new()])
            .await
            .unwrap();
        let second = service
            .create_settlement(employee, Money::from_cents(320_000), vec![OrderId::new()])
            .await
            .unwrap();

        assert_eq!(first.number, "RY-000001");
        assert_eq!(second.number, "RY-000002");
        assert_eq!(service.active_settlement_count(), 2);
    }

    #[tokio::test]
    async fn test_void_settlement() {
        let service = InMemoryInvoiceService::new();
        let invoice = service
            .create_settlement(EmployeeId::new(), Money::from_cents(100), vec![])
            .await
            .unwrap();

        service.void_settlement(&invoice.number).await.unwrap();

        assert_eq!(service.active_settlement_count(), 0);
        assert!(service.settlement(&invoice.number).is_some_and(|i| i.voided));
    }

    #[tokio::test]
    async fn test_list_settlements_scoped_to_employee() {
        let service = InMemoryInvoiceService::new();
        let employee = EmployeeId::new();
        let other = EmployeeId::new();

        let first = service
            .create_settlement(employee, Money::from_cents(5_400), vec![OrderId::new()])
            .await
            .unwrap();
        let second = service
            .create_settlement(employee, Money::from_cents(3_200), vec![OrderId::new()])
            .await
            .unwrap();
        service
            .create_settlement(other, Money::from_cents(1_000), vec![OrderId::new()])
            .await
            .unwrap();
        let voided = service
            .create_settlement(employee, Money::from_cents(900), vec![OrderId::new()])
            .await
            .unwrap();
        service.void_settlement(&voided.number).await.unwrap();

        let listed = service.list_settlements(employee).await.unwrap();

        // Only the employee's live invoices, newest first
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);
        let numbers: Vec<&str> = listed.iter().map(|i| i.number.as_str()).collect();
        assert!(numbers.contains(&first.number.as_str()));
        assert!(numbers.contains(&second.number.as_str()));
    }

    #[tokio::test]
    async fn test_fail_on_purchase() {
        let service = InMemoryInvoiceService::new();
        service.set_fail_on_purchase(true);

        let result = service.create_purchase(&draft()).await;

        assert!(result.is_err());
        assert_eq!(service.active_purchase_count(), 0);
    }
}
