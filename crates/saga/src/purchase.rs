//! Purchase invoicing flow coordinator.

use common::AggregateId;
use domain::{
    AccountEvent, Aggregate, CashAccount, CommandResult, DomainEvent, LedgerService, Money,
    RecordMovement, ReferenceKind,
};
use journal::{AppendOptions, Journal, JournalEntry, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::FlowInstance;
use crate::error::FlowError;
use crate::events::FlowEvent;
use crate::flows;
use crate::services::expenses::{ExpenseCategory, ExpenseService};
use crate::services::invoices::{InvoiceService, PurchaseInvoice};
use crate::services::stock::StockService;

/// One line of a purchase draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// SKU being purchased.
    pub sku: String,
    /// Quantity purchased.
    pub quantity: u32,
    /// Cost per unit.
    pub unit_cost: Money,
}

impl PurchaseLine {
    /// Creates a new purchase line.
    pub fn new(sku: impl Into<String>, quantity: u32, unit_cost: Money) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_cost,
        }
    }

    /// Returns quantity times unit cost.
    pub fn line_total(&self) -> Money {
        self.unit_cost.multiply(self.quantity)
    }
}

/// A purchase to invoice: supplier, lines, and fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseDraft {
    /// Supplier name.
    pub supplier: String,
    /// Lines being purchased.
    pub lines: Vec<PurchaseLine>,
    /// Shipping fee, zero when not charged.
    pub shipping_fee: Money,
    /// Bank transfer fee, zero when not charged.
    pub transfer_fee: Money,
}

impl PurchaseDraft {
    /// Creates a new draft for a supplier with no lines or fees.
    pub fn new(supplier: impl Into<String>) -> Self {
        Self {
            supplier: supplier.into(),
            lines: Vec::new(),
            shipping_fee: Money::zero(),
            transfer_fee: Money::zero(),
        }
    }

    /// Adds a line to the draft.
    pub fn with_line(mut self, sku: impl Into<String>, quantity: u32, unit_cost: Money) -> Self {
        self.lines.push(PurchaseLine::new(sku, quantity, unit_cost));
        self
    }

    /// Sets the shipping fee.
    pub fn with_shipping_fee(mut self, fee: Money) -> Self {
        self.shipping_fee = fee;
        self
    }

    /// Sets the bank transfer fee.
    pub fn with_transfer_fee(mut self, fee: Money) -> Self {
        self.transfer_fee = fee;
        self
    }

    /// Returns the sum of line totals, excluding fees.
    pub fn goods_total(&self) -> Money {
        self.lines.iter().map(PurchaseLine::line_total).sum()
    }

    /// Returns the goods total plus fees.
    pub fn total(&self) -> Money {
        self.goods_total() + self.shipping_fee + self.transfer_fee
    }

    /// Validates the draft before any side effect is taken.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.supplier.trim().is_empty() {
            return Err(FlowError::InvalidDraft("Supplier is required".to_string()));
        }
        if self.lines.is_empty() {
            return Err(FlowError::InvalidDraft(
                "At least one line is required".to_string(),
            ));
        }
        for line in &self.lines {
            if line.sku.trim().is_empty() {
                return Err(FlowError::InvalidDraft("Line SKU is required".to_string()));
            }
            if line.quantity == 0 {
                return Err(FlowError::InvalidDraft(format!(
                    "Line {} has zero quantity",
                    line.sku
                )));
            }
            if line.unit_cost.is_negative() {
                return Err(FlowError::InvalidDraft(format!(
                    "Line {} has a negative unit cost",
                    line.sku
                )));
            }
        }
        if self.shipping_fee.is_negative() {
            return Err(FlowError::InvalidDraft(
                "Shipping fee cannot be negative".to_string(),
            ));
        }
        if self.transfer_fee.is_negative() {
            return Err(FlowError::InvalidDraft(
                "Transfer fee cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful purchase invoicing flow.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    /// The flow instance ID.
    pub flow_id: AggregateId,
    /// The invoice that was created.
    pub invoice: PurchaseInvoice,
}

/// Orchestrates purchase invoicing and deletion flows.
///
/// Invoicing is a 5-step flow (validate → invoice → stock → payment →
/// expenses) with compensating actions on failure. Deletion fully reverses
/// an invoiced purchase with the same compensation discipline: a failure
/// mid-reversal puts the reversed pieces back and the invoice stays in
/// force. Both flows are event-sourced.
pub struct PurchaseCoordinator<J, St, E, I>
where
    J: Journal,
    St: StockService,
    E: ExpenseService,
    I: InvoiceService,
{
    journal: J,
    ledger: LedgerService<J>,
    operating_account: AggregateId,
    stock: St,
    expenses: E,
    invoices: I,
}

impl<J, St, E, I> PurchaseCoordinator<J, St, E, I>
where
    J: Journal + Clone,
    St: StockService,
    E: ExpenseService,
    I: InvoiceService,
{
    /// Creates a new purchase coordinator.
    pub fn new(
        journal: J,
        operating_account: AggregateId,
        stock: St,
        expenses: E,
        invoices: I,
    ) -> Self {
        let ledger = LedgerService::new(journal.clone());
        Self {
            journal,
            ledger,
            operating_account,
            stock,
            expenses,
            invoices,
        }
    }

    /// Executes the purchase invoicing flow for a draft.
    ///
    /// Validation failures reject the draft before any side effect. Later
    /// failures compensate completed steps in reverse order and surface the
    /// failure to the caller.
    #[tracing::instrument(skip(self, draft), fields(flow_type = flows::PURCHASE_FLOW))]
    pub async fn create_purchase(&self, draft: PurchaseDraft) -> Result<PurchaseOutcome, FlowError> {
        metrics::counter!("flow_executions_total").increment(1);
        let flow_start = std::time::Instant::now();

        let flow_id = AggregateId::new();
        let mut version = Version::initial();

        let started_event =
            FlowEvent::flow_started(flow_id, flows::PURCHASE_FLOW, draft.supplier.clone());
        version = self
            .append_flow_event(flow_id, version, &started_event)
            .await?;

        let mut flow = FlowInstance::default();
        flow.apply(started_event);

        // Step 1: Validate the draft (no side effects yet)
        tracing::info!(step = flows::STEP_VALIDATE_DRAFT, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_VALIDATE_DRAFT);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        if let Err(e) = draft.validate() {
            let reason = e.to_string();
            let step_failed = FlowEvent::step_failed(flows::STEP_VALIDATE_DRAFT, &reason);
            version = self
                .append_flow_event(flow_id, version, &step_failed)
                .await?;
            flow.apply(step_failed);

            let flow_failed = FlowEvent::flow_failed(&reason);
            self.append_flow_event(flow_id, version, &flow_failed)
                .await?;

            metrics::counter!("flow_failed").increment(1);
            return Err(e);
        }

        let step_completed = FlowEvent::step_completed(flows::STEP_VALIDATE_DRAFT);
        version = self
            .append_flow_event(flow_id, version, &step_completed)
            .await?;
        flow.apply(step_completed);

        let total = draft.total();
        let mut applied: Vec<(String, u32)> = Vec::new();

        // Step 2: Create the invoice
        tracing::info!(step = flows::STEP_CREATE_INVOICE, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_CREATE_INVOICE);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let invoice = match self.invoices.create_purchase(&draft).await {
            Ok(invoice) => {
                let step_completed = FlowEvent::step_completed_invoice(
                    flows::STEP_CREATE_INVOICE,
                    invoice.invoice_id.clone(),
                );
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
                invoice
            }
            Err(e) => {
                return self
                    .fail_purchase(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_CREATE_INVOICE,
                        e,
                        None,
                        &applied,
                        flow_start,
                    )
                    .await;
            }
        };

        // Step 3: Apply stock increments per line
        tracing::info!(step = flows::STEP_APPLY_STOCK, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_APPLY_STOCK);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let mut stock_error = None;
        for line in &invoice.lines {
            match self
                .stock
                .increment(&line.sku, line.quantity, line.unit_cost)
                .await
            {
                Ok(()) => applied.push((line.sku.clone(), line.quantity)),
                Err(e) => {
                    stock_error = Some(e);
                    break;
                }
            }
        }

        match stock_error {
            None => {
                let step_completed = FlowEvent::step_completed(flows::STEP_APPLY_STOCK);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Some(e) => {
                return self
                    .fail_purchase(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_APPLY_STOCK,
                        e,
                        Some(&invoice),
                        &applied,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 4: Pay the supplier from the operating account
        tracing::info!(step = flows::STEP_RECORD_PAYMENT, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_RECORD_PAYMENT);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let payment = RecordMovement::outgoing(
            self.operating_account,
            total,
            ReferenceKind::Purchase,
            format!("Purchase {} from {}", invoice.invoice_id, invoice.supplier),
        )
        .with_reference_id(&invoice.invoice_id);

        match self.ledger.record_movement(payment).await {
            Ok(result) => {
                let movement_id = movement_id_from(&result)
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                let step_completed = FlowEvent::step_completed_movement(
                    flows::STEP_RECORD_PAYMENT,
                    movement_id,
                );
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Err(e) => {
                return self
                    .fail_purchase(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_RECORD_PAYMENT,
                        e.into(),
                        Some(&invoice),
                        &applied,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 5: Record expense rows
        tracing::info!(step = flows::STEP_RECORD_EXPENSES, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_RECORD_EXPENSES);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        match self.record_purchase_expenses(&invoice).await {
            Ok(expense_ids) => {
                let step_completed =
                    FlowEvent::step_completed_expenses(flows::STEP_RECORD_EXPENSES, expense_ids);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Err(e) => {
                return self
                    .fail_purchase(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_RECORD_EXPENSES,
                        e,
                        Some(&invoice),
                        &applied,
                        flow_start,
                    )
                    .await;
            }
        }

        // Flow completed
        let completed_event = FlowEvent::flow_completed();
        self.append_flow_event(flow_id, version, &completed_event)
            .await?;

        let duration = flow_start.elapsed().as_secs_f64();
        metrics::histogram!("flow_duration_seconds").record(duration);
        metrics::counter!("flow_completed").increment(1);
        tracing::info!(%flow_id, invoice_id = %invoice.invoice_id, duration, "purchase flow completed");

        Ok(PurchaseOutcome { flow_id, invoice })
    }

    /// Fully reverses an invoiced purchase.
    ///
    /// Expenses are removed, the supplier payment is refunded, and stock is
    /// backed out per line. Stock may go negative if units were already sold.
    /// If a step fails, the reversals that already landed are compensated so
    /// the invoice stays fully in force, and the failure is surfaced.
    #[tracing::instrument(skip(self), fields(flow_type = flows::PURCHASE_DELETE_FLOW))]
    pub async fn delete_purchase(&self, invoice_id: &str) -> Result<AggregateId, FlowError> {
        metrics::counter!("flow_executions_total").increment(1);
        let flow_start = std::time::Instant::now();

        let invoice = self
            .invoices
            .get_purchase(invoice_id)
            .await?
            .ok_or_else(|| FlowError::PurchaseNotFound(invoice_id.to_string()))?;

        if invoice.deleted {
            return Err(FlowError::PurchaseDeleted(invoice_id.to_string()));
        }

        let flow_id = AggregateId::new();
        let mut version = Version::initial();

        let started_event =
            FlowEvent::flow_started(flow_id, flows::PURCHASE_DELETE_FLOW, invoice_id);
        version = self
            .append_flow_event(flow_id, version, &started_event)
            .await?;

        let mut flow = FlowInstance::default();
        flow.apply(started_event);

        let mut reversed: Vec<PurchaseLine> = Vec::new();

        // Step 1: Remove the expense rows
        tracing::info!(step = flows::STEP_REMOVE_EXPENSES, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_REMOVE_EXPENSES);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        match self.expenses.remove_by_reference(invoice_id).await {
            Ok(_) => {
                let step_completed = FlowEvent::step_completed(flows::STEP_REMOVE_EXPENSES);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Err(e) => {
                return self
                    .fail_delete(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_REMOVE_EXPENSES,
                        e,
                        &invoice,
                        &reversed,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 2: Refund the supplier payment
        tracing::info!(step = flows::STEP_REFUND_PAYMENT, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_REFUND_PAYMENT);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let refund = RecordMovement::incoming(
            self.operating_account,
            invoice.total,
            ReferenceKind::PurchaseReversal,
            format!("Reversal of purchase {}", invoice_id),
        )
        .with_reference_id(invoice_id);

        match self.ledger.record_movement(refund).await {
            Ok(result) => {
                let movement_id = movement_id_from(&result)
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                let step_completed =
                    FlowEvent::step_completed_movement(flows::STEP_REFUND_PAYMENT, movement_id);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Err(e) => {
                return self
                    .fail_delete(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_REFUND_PAYMENT,
                        e.into(),
                        &invoice,
                        &reversed,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 3: Back out the stock per line
        tracing::info!(step = flows::STEP_REVERSE_STOCK, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_REVERSE_STOCK);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let mut stock_error = None;
        for line in &invoice.lines {
            match self.stock.decrement(&line.sku, line.quantity).await {
                Ok(()) => reversed.push(line.clone()),
                Err(e) => {
                    stock_error = Some(e);
                    break;
                }
            }
        }

        match stock_error {
            None => {
                let step_completed = FlowEvent::step_completed(flows::STEP_REVERSE_STOCK);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Some(e) => {
                return self
                    .fail_delete(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_REVERSE_STOCK,
                        e,
                        &invoice,
                        &reversed,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 4: Mark the invoice deleted
        tracing::info!(step = flows::STEP_MARK_DELETED, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_MARK_DELETED);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        match self.invoices.mark_purchase_deleted(invoice_id).await {
            Ok(()) => {
                let step_completed = FlowEvent::step_completed(flows::STEP_MARK_DELETED);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Err(e) => {
                return self
                    .fail_delete(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_MARK_DELETED,
                        e,
                        &invoice,
                        &reversed,
                        flow_start,
                    )
                    .await;
            }
        }

        let completed_event = FlowEvent::flow_completed();
        self.append_flow_event(flow_id, version, &completed_event)
            .await?;

        let duration = flow_start.elapsed().as_secs_f64();
        metrics::histogram!("flow_duration_seconds").record(duration);
        metrics::counter!("flow_completed").increment(1);
        tracing::info!(%flow_id, invoice_id, duration, "purchase deletion completed");

        Ok(flow_id)
    }

    /// Loads a flow instance by ID from the journal.
    pub async fn get_flow(&self, flow_id: AggregateId) -> Result<Option<FlowInstance>, FlowError> {
        load_flow(&self.journal, flow_id).await
    }

    /// Records the goods expense and, when charged, the shipping and
    /// transfer fee expenses for an invoice.
    async fn record_purchase_expenses(
        &self,
        invoice: &PurchaseInvoice,
    ) -> Result<Vec<String>, FlowError> {
        let reference = Some(invoice.invoice_id.clone());
        let mut expense_ids = Vec::new();

        let goods_id = self
            .expenses
            .record(
                ExpenseCategory::Goods,
                invoice.goods_total,
                &format!("Purchase {} goods", invoice.invoice_id),
                reference.clone(),
            )
            .await?;
        expense_ids.push(goods_id);

        if invoice.shipping_fee.is_positive() {
            let shipping_id = self
                .expenses
                .record(
                    ExpenseCategory::Shipping,
                    invoice.shipping_fee,
                    &format!("Purchase {} shipping", invoice.invoice_id),
                    reference.clone(),
                )
                .await?;
            expense_ids.push(shipping_id);
        }

        if invoice.transfer_fee.is_positive() {
            let transfer_id = self
                .expenses
                .record(
                    ExpenseCategory::Transfer,
                    invoice.transfer_fee,
                    &format!("Purchase {} transfer fee", invoice.invoice_id),
                    reference,
                )
                .await?;
            expense_ids.push(transfer_id);
        }

        Ok(expense_ids)
    }

    /// Records the step failure, compensates in reverse order, and surfaces
    /// the failure.
    #[allow(clippy::too_many_arguments)]
    async fn fail_purchase<T>(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        error: FlowError,
        invoice: Option<&PurchaseInvoice>,
        applied: &[(String, u32)],
        flow_start: std::time::Instant,
    ) -> Result<T, FlowError> {
        let reason = error.to_string();

        let step_failed = FlowEvent::step_failed(failed_step, &reason);
        *version = self.append_flow_event(flow_id, *version, &step_failed).await?;
        flow.apply(step_failed);

        let comp_failure = self
            .compensate_purchase(flow, flow_id, version, failed_step, invoice, applied)
            .await?;

        let flow_failed = FlowEvent::flow_failed(format!("Step failed: {}", failed_step));
        *version = self.append_flow_event(flow_id, *version, &flow_failed).await?;
        flow.apply(flow_failed);

        metrics::histogram!("flow_duration_seconds").record(flow_start.elapsed().as_secs_f64());
        metrics::counter!("flow_failed").increment(1);
        tracing::warn!(%flow_id, step = failed_step, %reason, "purchase flow failed");

        Err(match comp_failure {
            Some((step, comp_reason)) => FlowError::CompensationFailed {
                step,
                reason: comp_reason,
            },
            None => error,
        })
    }

    /// Runs compensating actions in reverse order of completed steps.
    ///
    /// The failed step is included so its partial effects (stock lines
    /// already applied, expense rows already recorded) are reversed too.
    /// Returns the first compensation failure, if any.
    async fn compensate_purchase(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        invoice: Option<&PurchaseInvoice>,
        applied: &[(String, u32)],
    ) -> Result<Option<(String, String)>, FlowError> {
        let comp_started = FlowEvent::compensation_started(failed_step);
        *version = self
            .append_flow_event(flow_id, *version, &comp_started)
            .await?;
        flow.apply(comp_started);

        let mut steps: Vec<String> = flow.completed_steps().to_vec();
        steps.push(failed_step.to_string());

        let mut first_failure = None;

        for step in steps.iter().rev() {
            let outcome = match step.as_str() {
                flows::STEP_RECORD_EXPENSES => match invoice {
                    Some(invoice) => Some(
                        self.expenses
                            .remove_by_reference(&invoice.invoice_id)
                            .await
                            .map(|_| ()),
                    ),
                    None => None,
                },
                flows::STEP_RECORD_PAYMENT => match (invoice, flow.movement_id()) {
                    // Only refund when the payment actually landed
                    (Some(invoice), Some(_)) => {
                        let refund = RecordMovement::incoming(
                            self.operating_account,
                            invoice.total,
                            ReferenceKind::PurchaseReversal,
                            format!("Reversal of purchase {}", invoice.invoice_id),
                        )
                        .with_reference_id(&invoice.invoice_id);
                        Some(
                            self.ledger
                                .record_movement(refund)
                                .await
                                .map(|_| ())
                                .map_err(FlowError::from),
                        )
                    }
                    _ => None,
                },
                flows::STEP_APPLY_STOCK => {
                    let mut result = Ok(());
                    for (sku, quantity) in applied.iter().rev() {
                        if let Err(e) = self.stock.decrement(sku, *quantity).await {
                            result = Err(e);
                            break;
                        }
                    }
                    if applied.is_empty() { None } else { Some(result) }
                }
                flows::STEP_CREATE_INVOICE => match invoice {
                    Some(invoice) => Some(
                        self.invoices
                            .mark_purchase_deleted(&invoice.invoice_id)
                            .await,
                    ),
                    None => None,
                },
                _ => None,
            };

            match outcome {
                Some(Ok(())) => {
                    let event = FlowEvent::compensation_step_completed(step);
                    *version = self.append_flow_event(flow_id, *version, &event).await?;
                    flow.apply(event);
                }
                Some(Err(e)) => {
                    let event = FlowEvent::compensation_step_failed(step, e.to_string());
                    *version = self.append_flow_event(flow_id, *version, &event).await?;
                    flow.apply(event);
                    if first_failure.is_none() {
                        first_failure = Some((step.clone(), e.to_string()));
                    }
                }
                None => {}
            }
        }

        Ok(first_failure)
    }

    /// Records a deletion step failure, compensates in reverse order, and
    /// surfaces the failure.
    #[allow(clippy::too_many_arguments)]
    async fn fail_delete<T>(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        error: FlowError,
        invoice: &PurchaseInvoice,
        reversed: &[PurchaseLine],
        flow_start: std::time::Instant,
    ) -> Result<T, FlowError> {
        let reason = error.to_string();

        let step_failed = FlowEvent::step_failed(failed_step, &reason);
        *version = self.append_flow_event(flow_id, *version, &step_failed).await?;
        flow.apply(step_failed);

        let comp_failure = self
            .compensate_delete(flow, flow_id, version, failed_step, invoice, reversed)
            .await?;

        let flow_failed = FlowEvent::flow_failed(format!("Step failed: {}", failed_step));
        *version = self.append_flow_event(flow_id, *version, &flow_failed).await?;
        flow.apply(flow_failed);

        metrics::histogram!("flow_duration_seconds").record(flow_start.elapsed().as_secs_f64());
        metrics::counter!("flow_failed").increment(1);
        tracing::warn!(%flow_id, step = failed_step, %reason, "purchase deletion failed");

        Err(match comp_failure {
            Some((step, comp_reason)) => FlowError::CompensationFailed {
                step,
                reason: comp_reason,
            },
            None => error,
        })
    }

    /// Puts already-reversed pieces of a failed deletion back, in reverse
    /// order of completed steps.
    ///
    /// The failed step is included so its partial effects (stock lines
    /// already backed out) are restored too. The invoice keeps its expense
    /// rows and supplier payment exactly as before the deletion was
    /// attempted. Returns the first compensation failure, if any.
    async fn compensate_delete(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        invoice: &PurchaseInvoice,
        reversed: &[PurchaseLine],
    ) -> Result<Option<(String, String)>, FlowError> {
        let comp_started = FlowEvent::compensation_started(failed_step);
        *version = self
            .append_flow_event(flow_id, *version, &comp_started)
            .await?;
        flow.apply(comp_started);

        let mut steps: Vec<String> = flow.completed_steps().to_vec();
        steps.push(failed_step.to_string());

        let mut first_failure = None;

        for step in steps.iter().rev() {
            let outcome = match step.as_str() {
                flows::STEP_REVERSE_STOCK => {
                    let mut result = Ok(());
                    for line in reversed.iter().rev() {
                        if let Err(e) = self
                            .stock
                            .increment(&line.sku, line.quantity, line.unit_cost)
                            .await
                        {
                            result = Err(e);
                            break;
                        }
                    }
                    if reversed.is_empty() { None } else { Some(result) }
                }
                flows::STEP_REFUND_PAYMENT
                    // Only re-debit when the refund actually landed
                    if flow.completed_steps().contains(&step.to_string()) =>
                {
                    let payment = RecordMovement::outgoing(
                        self.operating_account,
                        invoice.total,
                        ReferenceKind::Purchase,
                        format!(
                            "Reinstated payment for purchase {} from {}",
                            invoice.invoice_id, invoice.supplier
                        ),
                    )
                    .with_reference_id(&invoice.invoice_id);
                    Some(
                        self.ledger
                            .record_movement(payment)
                            .await
                            .map(|_| ())
                            .map_err(FlowError::from),
                    )
                }
                flows::STEP_REMOVE_EXPENSES
                    // Removal is atomic; rows are only gone when it completed
                    if flow.completed_steps().contains(&step.to_string()) =>
                {
                    Some(
                        self.record_purchase_expenses(invoice)
                            .await
                            .map(|_| ()),
                    )
                }
                _ => None,
            };

            match outcome {
                Some(Ok(())) => {
                    let event = FlowEvent::compensation_step_completed(step);
                    *version = self.append_flow_event(flow_id, *version, &event).await?;
                    flow.apply(event);
                }
                Some(Err(e)) => {
                    let event = FlowEvent::compensation_step_failed(step, e.to_string());
                    *version = self.append_flow_event(flow_id, *version, &event).await?;
                    flow.apply(event);
                    if first_failure.is_none() {
                        first_failure = Some((step.clone(), e.to_string()));
                    }
                }
                None => {}
            }
        }

        Ok(first_failure)
    }

    /// Appends a single flow event to the journal.
    async fn append_flow_event(
        &self,
        flow_id: AggregateId,
        current_version: Version,
        event: &FlowEvent,
    ) -> Result<Version, FlowError> {
        append_flow_event(&self.journal, flow_id, current_version, event).await
    }
}

/// Extracts the movement ID from a ledger command result.
fn movement_id_from(result: &CommandResult<CashAccount>) -> Option<uuid::Uuid> {
    result.events.iter().find_map(|event| match event {
        AccountEvent::MovementRecorded(data) => Some(data.movement_id),
        _ => None,
    })
}

/// Appends a single flow event to a journal stream.
pub(crate) async fn append_flow_event<J: Journal>(
    journal: &J,
    flow_id: AggregateId,
    current_version: Version,
    event: &FlowEvent,
) -> Result<Version, FlowError> {
    let next_version = current_version.next();

    let entry = JournalEntry::builder()
        .entry_type(event.event_type())
        .aggregate_id(flow_id)
        .aggregate_type(FlowInstance::aggregate_type())
        .version(next_version)
        .payload(event)?
        .build();

    let new_version = journal
        .append(vec![entry], AppendOptions::expect_version(current_version))
        .await?;

    Ok(new_version)
}

/// Replays a flow instance from its journal stream.
pub(crate) async fn load_flow<J: Journal>(
    journal: &J,
    flow_id: AggregateId,
) -> Result<Option<FlowInstance>, FlowError> {
    let entries = journal.entries_for_aggregate(flow_id).await?;

    if entries.is_empty() {
        return Ok(None);
    }

    let mut flow = FlowInstance::default();
    for entry in entries {
        let event: FlowEvent = serde_json::from_value(entry.payload)?;
        flow.apply(event);
    }
    Ok(Some(flow))
}
