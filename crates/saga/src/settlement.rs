//! Profit settlement flow coordinator.

use chrono::{DateTime, Utc};
use common::{AggregateId, EmployeeId, OrderId};
use domain::{
    Aggregate, LedgerService, Money, ProfitService, ProfitStatus, RecordMovement, ReferenceKind,
};
use journal::{Journal, Version};
use tokio::sync::Mutex;

use crate::aggregate::FlowInstance;
use crate::error::FlowError;
use crate::events::FlowEvent;
use crate::flows;
use crate::purchase::{append_flow_event, load_flow};
use crate::services::expenses::{ExpenseCategory, ExpenseService};
use crate::services::invoices::{InvoiceService, SettlementInvoice};

/// Result of a successful settlement flow.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// The flow instance ID.
    pub flow_id: AggregateId,
    /// Stable ID the settled records point at.
    pub invoice_id: AggregateId,
    /// Human-facing settlement invoice number.
    pub invoice_number: String,
    /// Total employee dues paid out.
    pub total: Money,
    /// Settlement timestamp shared by every record in the batch.
    pub settled_at: DateTime<Utc>,
}

/// Orchestrates all-or-nothing settlement of an employee's profit records.
///
/// A settlement covers a batch of orders: every claimed record must exist,
/// be pending, and belong to the claimant before any side effect is taken.
/// The batch then gets one invoice, one payout movement, and one dues
/// expense, with every record settled under the same timestamp. Settlements
/// are serialized; concurrent requests for the same records cannot
/// interleave.
pub struct SettlementCoordinator<J, E, I>
where
    J: Journal,
    E: ExpenseService,
    I: InvoiceService,
{
    journal: J,
    ledger: LedgerService<J>,
    profits: ProfitService<J>,
    operating_account: AggregateId,
    expenses: E,
    invoices: I,
    lock: Mutex<()>,
}

impl<J, E, I> SettlementCoordinator<J, E, I>
where
    J: Journal + Clone,
    E: ExpenseService,
    I: InvoiceService,
{
    /// Creates a new settlement coordinator.
    pub fn new(journal: J, operating_account: AggregateId, expenses: E, invoices: I) -> Self {
        let ledger = LedgerService::new(journal.clone());
        let profits = ProfitService::new(journal.clone());
        Self {
            journal,
            ledger,
            profits,
            operating_account,
            expenses,
            invoices,
            lock: Mutex::new(()),
        }
    }

    /// Returns the profit service backed by the same journal.
    pub fn profits(&self) -> &ProfitService<J> {
        &self.profits
    }

    /// Settles the employee's share of the given orders.
    ///
    /// Preconditions are checked for the whole batch before any side effect:
    /// a missing, already settled, or foreign record rejects the entire
    /// request. On later failures, completed steps are compensated in
    /// reverse order and the failure is surfaced.
    #[tracing::instrument(skip(self), fields(flow_type = flows::SETTLEMENT_FLOW))]
    pub async fn settle(
        &self,
        employee_id: EmployeeId,
        order_ids: Vec<OrderId>,
    ) -> Result<SettlementOutcome, FlowError> {
        let _guard = self.lock.lock().await;

        metrics::counter!("flow_executions_total").increment(1);
        let flow_start = std::time::Instant::now();

        if order_ids.is_empty() {
            return Err(FlowError::NothingToSettle);
        }

        let mut seen = std::collections::HashSet::with_capacity(order_ids.len());
        for &order_id in &order_ids {
            if !seen.insert(order_id) {
                return Err(FlowError::DuplicateOrder(order_id));
            }
        }

        let flow_id = AggregateId::new();
        let mut version = Version::initial();

        let started_event =
            FlowEvent::flow_started(flow_id, flows::SETTLEMENT_FLOW, employee_id.to_string());
        version = self
            .append_flow_event(flow_id, version, &started_event)
            .await?;

        let mut flow = FlowInstance::default();
        flow.apply(started_event);

        // Step 1: Check every claimed record (no side effects yet)
        tracing::info!(step = flows::STEP_CHECK_RECORDS, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_CHECK_RECORDS);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let mut total = Money::zero();
        let mut check_error = None;
        for &order_id in &order_ids {
            match self.profits.get_record(order_id).await? {
                None => {
                    check_error = Some(FlowError::ProfitRecordMissing(order_id));
                    break;
                }
                Some(record) => {
                    if record.status() == ProfitStatus::Settled {
                        check_error = Some(FlowError::AlreadySettled(order_id));
                        break;
                    }
                    if record.employee_id() != Some(employee_id) {
                        check_error = Some(FlowError::NotOwner {
                            order_id,
                            claimant: employee_id,
                        });
                        break;
                    }
                    total += record
                        .breakdown()
                        .map(|b| b.employee_profit)
                        .unwrap_or_default();
                }
            }
        }

        if let Some(e) = check_error {
            let reason = e.to_string();
            let step_failed = FlowEvent::step_failed(flows::STEP_CHECK_RECORDS, &reason);
            version = self
                .append_flow_event(flow_id, version, &step_failed)
                .await?;
            flow.apply(step_failed);

            let flow_failed = FlowEvent::flow_failed(&reason);
            self.append_flow_event(flow_id, version, &flow_failed)
                .await?;

            metrics::counter!("flow_failed").increment(1);
            tracing::warn!(%flow_id, %employee_id, %reason, "settlement rejected");
            return Err(e);
        }

        let step_completed = FlowEvent::step_completed(flows::STEP_CHECK_RECORDS);
        version = self
            .append_flow_event(flow_id, version, &step_completed)
            .await?;
        flow.apply(step_completed);

        let mut settled: Vec<OrderId> = Vec::new();

        // Step 2: Create the settlement invoice
        tracing::info!(step = flows::STEP_CREATE_INVOICE, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_CREATE_INVOICE);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let invoice = match self
            .invoices
            .create_settlement(employee_id, total, order_ids.clone())
            .await
        {
            Ok(invoice) => {
                let step_completed = FlowEvent::step_completed_invoice(
                    flows::STEP_CREATE_INVOICE,
                    invoice.number.clone(),
                );
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
                invoice
            }
            Err(e) => {
                return self
                    .fail_settlement(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_CREATE_INVOICE,
                        e,
                        None,
                        &settled,
                        total,
                        flow_start,
                    )
                    .await;
            }
        };

        // Step 3: Settle every record under one shared timestamp
        tracing::info!(step = flows::STEP_SETTLE_RECORDS, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_SETTLE_RECORDS);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        let settled_at = Utc::now();
        let mut settle_error = None;
        for &order_id in &order_ids {
            match self
                .profits
                .settle(order_id, employee_id, settled_at, invoice.invoice_id)
                .await
            {
                Ok(_) => settled.push(order_id),
                Err(e) => {
                    settle_error = Some(FlowError::from(e));
                    break;
                }
            }
        }

        match settle_error {
            None => {
                let step_completed = FlowEvent::step_completed(flows::STEP_SETTLE_RECORDS);
                version = self
                    .append_flow_event(flow_id, version, &step_completed)
                    .await?;
                flow.apply(step_completed);
            }
            Some(e) => {
                return self
                    .fail_settlement(
                        &mut flow,
                        flow_id,
                        &mut version,
                        flows::STEP_SETTLE_RECORDS,
                        e,
                        Some(&invoice),
                        &settled,
                        total,
                        flow_start,
                    )
                    .await;
            }
        }

        // Step 4: Pay the dues out of the operating account
        tracing::info!(step = flows::STEP_RECORD_PAYOUT, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_RECORD_PAYOUT);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        // Nothing leaves the account when the dues are not positive
        if total.is_positive() {
            let payout = RecordMovement::outgoing(
                self.operating_account,
                total,
                ReferenceKind::Settlement,
                format!("Employee dues {}", invoice.number),
            )
            .with_reference_id(&invoice.number);

            match self.ledger.record_movement(payout).await {
                Ok(_) => {
                    let step_completed =
                        FlowEvent::step_completed(flows::STEP_RECORD_PAYOUT);
                    version = self
                        .append_flow_event(flow_id, version, &step_completed)
                        .await?;
                    flow.apply(step_completed);
                }
                Err(e) => {
                    return self
                        .fail_settlement(
                            &mut flow,
                            flow_id,
                            &mut version,
                            flows::STEP_RECORD_PAYOUT,
                            e.into(),
                            Some(&invoice),
                            &settled,
                            total,
                            flow_start,
                        )
                        .await;
                }
            }
        } else {
            let step_completed = FlowEvent::step_completed(flows::STEP_RECORD_PAYOUT);
            version = self
                .append_flow_event(flow_id, version, &step_completed)
                .await?;
            flow.apply(step_completed);
        }

        // Step 5: Record the dues expense row
        tracing::info!(step = flows::STEP_RECORD_DUES, "flow step started");
        let step_started = FlowEvent::step_started(flows::STEP_RECORD_DUES);
        version = self
            .append_flow_event(flow_id, version, &step_started)
            .await?;
        flow.apply(step_started);

        if total.is_positive() {
            match self
                .expenses
                .record(
                    ExpenseCategory::EmployeeDues,
                    total,
                    &format!("Employee dues {}", invoice.number),
                    Some(invoice.number.clone()),
                )
                .await
            {
                Ok(expense_id) => {
                    let step_completed = FlowEvent::step_completed_expenses(
                        flows::STEP_RECORD_DUES,
                        vec![expense_id],
                    );
                    version = self
                        .append_flow_event(flow_id, version, &step_completed)
                        .await?;
                    flow.apply(step_completed);
                }
                Err(e) => {
                    return self
                        .fail_settlement(
                            &mut flow,
                            flow_id,
                            &mut version,
                            flows::STEP_RECORD_DUES,
                            e,
                            Some(&invoice),
                            &settled,
                            total,
                            flow_start,
                        )
                        .await;
                }
            }
        } else {
            let step_completed = FlowEvent::step_completed(flows::STEP_RECORD_DUES);
            version = self
                .append_flow_event(flow_id, version, &step_completed)
                .await?;
            flow.apply(step_completed);
        }

        // Flow completed
        let completed_event = FlowEvent::flow_completed();
        self.append_flow_event(flow_id, version, &completed_event)
            .await?;

        let duration = flow_start.elapsed().as_secs_f64();
        metrics::histogram!("flow_duration_seconds").record(duration);
        metrics::counter!("flow_completed").increment(1);
        tracing::info!(
            %flow_id,
            %employee_id,
            invoice_number = %invoice.number,
            total = %total,
            duration,
            "settlement flow completed"
        );

        Ok(SettlementOutcome {
            flow_id,
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.number,
            total,
            settled_at,
        })
    }

    /// Loads a flow instance by ID from the journal.
    pub async fn get_flow(&self, flow_id: AggregateId) -> Result<Option<FlowInstance>, FlowError> {
        load_flow(&self.journal, flow_id).await
    }

    /// Lists the employee's settlement invoices, newest first.
    pub async fn list_invoices(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<SettlementInvoice>, FlowError> {
        self.invoices.list_settlements(employee_id).await
    }

    /// Records the step failure, compensates in reverse order, and surfaces
    /// the failure.
    #[allow(clippy::too_many_arguments)]
    async fn fail_settlement<T>(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        error: FlowError,
        invoice: Option<&SettlementInvoice>,
        settled: &[OrderId],
        total: Money,
        flow_start: std::time::Instant,
    ) -> Result<T, FlowError> {
        let reason = error.to_string();

        let step_failed = FlowEvent::step_failed(failed_step, &reason);
        *version = self.append_flow_event(flow_id, *version, &step_failed).await?;
        flow.apply(step_failed);

        let comp_failure = self
            .compensate_settlement(flow, flow_id, version, failed_step, invoice, settled, total)
            .await?;

        let flow_failed = FlowEvent::flow_failed(format!("Step failed: {}", failed_step));
        *version = self.append_flow_event(flow_id, *version, &flow_failed).await?;
        flow.apply(flow_failed);

        metrics::histogram!("flow_duration_seconds").record(flow_start.elapsed().as_secs_f64());
        metrics::counter!("flow_failed").increment(1);
        tracing::warn!(%flow_id, step = failed_step, %reason, "settlement flow failed");

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
    /// The failed step is included so its partial effects (records already
    /// settled) are reverted too. Returns the first compensation failure.
    #[allow(clippy::too_many_arguments)]
    async fn compensate_settlement(
        &self,
        flow: &mut FlowInstance,
        flow_id: AggregateId,
        version: &mut Version,
        failed_step: &str,
        invoice: Option<&SettlementInvoice>,
        settled: &[OrderId],
        total: Money,
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
                flows::STEP_RECORD_DUES => match invoice {
                    Some(invoice) if total.is_positive() => Some(
                        self.expenses
                            .remove_by_reference(&invoice.number)
                            .await
                            .map(|_| ()),
                    ),
                    _ => None,
                },
                flows::STEP_RECORD_PAYOUT => match invoice {
                    // Only refund when the payout actually landed
                    Some(invoice)
                        if total.is_positive()
                            && flow.completed_steps().contains(&step.to_string()) =>
                    {
                        let refund = RecordMovement::incoming(
                            self.operating_account,
                            total,
                            ReferenceKind::SettlementReversal,
                            format!("Reversal of settlement {}", invoice.number),
                        )
                        .with_reference_id(&invoice.number);
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
                flows::STEP_SETTLE_RECORDS => {
                    let mut result = Ok(());
                    for &order_id in settled.iter().rev() {
                        if let Err(e) = self
                            .profits
                            .revert_settlement(order_id, "settlement compensation")
                            .await
                        {
                            result = Err(FlowError::from(e));
                            break;
                        }
                    }
                    if settled.is_empty() { None } else { Some(result) }
                }
                flows::STEP_CREATE_INVOICE => match invoice {
                    Some(invoice) => Some(self.invoices.void_settlement(&invoice.number).await),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::expenses::InMemoryExpenseService;
    use crate::services::invoices::InMemoryInvoiceService;
    use crate::state::FlowState;
    use domain::{OpenAccount, OrderFacts, OrderLine, OrderStatus, SellerRole};
    use journal::InMemoryJournal;

    struct Setup {
        coordinator:
            SettlementCoordinator<InMemoryJournal, InMemoryExpenseService, InMemoryInvoiceService>,
        ledger: LedgerService<InMemoryJournal>,
        expenses: InMemoryExpenseService,
        invoices: InMemoryInvoiceService,
        account_id: AggregateId,
    }

    async fn setup(opening_balance: Money) -> Setup {
        let journal = InMemoryJournal::new();
        let expenses = InMemoryExpenseService::new();
        let invoices = InMemoryInvoiceService::new();

        let ledger = LedgerService::new(journal.clone());
        let cmd = OpenAccount::with_name("Operating", opening_balance);
        let account_id = cmd.account_id;
        ledger.open_account(cmd).await.unwrap();

        let coordinator =
            SettlementCoordinator::new(journal, account_id, expenses.clone(), invoices.clone());

        Setup {
            coordinator,
            ledger,
            expenses,
            invoices,
            account_id,
        }
    }

    fn facts(employee_id: EmployeeId, unit_price: i64, cost: i64, final_amount: i64) -> OrderFacts {
        OrderFacts {
            order_id: OrderId::new(),
            created_by: employee_id,
            seller_role: SellerRole::Employee,
            lines: vec![OrderLine::new(
                Money::from_cents(unit_price),
                Money::from_cents(cost),
                1,
            )],
            final_amount: Money::from_cents(final_amount),
            delivery_fee: Money::zero(),
            status: OrderStatus::Delivered,
            receipt_received: true,
            sold_at: Utc::now(),
        }
    }

    async fn record_profit(s: &Setup, facts: &OrderFacts) -> OrderId {
        s.coordinator
            .profits()
            .record_order_profit(facts)
            .await
            .unwrap();
        facts.order_id
    }

    #[tokio::test]
    async fn test_settle_batch_shares_one_timestamp_and_invoice() {
        let s = setup(Money::from_cents(5_000_000)).await;
        let employee = EmployeeId::new();

        // Two orders: employee shares 5,400 and 3,200 at the default 30%
        let first = record_profit(&s, &facts(employee, 50_000, 32_000, 50_000)).await;
        let second = record_profit(&s, &facts(employee, 20_000, 9_333, 20_000)).await;

        let first_share = s
            .coordinator
            .profits()
            .get_record(first)
            .await
            .unwrap()
            .unwrap()
            .breakdown()
            .unwrap()
            .employee_profit;
        let second_share = s
            .coordinator
            .profits()
            .get_record(second)
            .await
            .unwrap()
            .unwrap()
            .breakdown()
            .unwrap()
            .employee_profit;

        let outcome = s
            .coordinator
            .settle(employee, vec![first, second])
            .await
            .unwrap();

        assert!(outcome.invoice_number.starts_with("RY-"));
        assert_eq!(outcome.total, first_share + second_share);

        // Both records settled at the identical timestamp, same invoice
        for order_id in [first, second] {
            let record = s
                .coordinator
                .profits()
                .get_record(order_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(record.status(), ProfitStatus::Settled);
            assert_eq!(record.settled_at(), Some(outcome.settled_at));
            assert_eq!(record.invoice_id(), Some(outcome.invoice_id));
        }

        // One payout movement and one dues expense
        let balance = s.ledger.get_balance(s.account_id).await.unwrap();
        assert_eq!(balance, Money::from_cents(5_000_000) - outcome.total);
        assert_eq!(s.expenses.expense_count(), 1);
        assert_eq!(
            s.expenses.total_for_category(ExpenseCategory::EmployeeDues),
            outcome.total
        );
        assert_eq!(s.invoices.active_settlement_count(), 1);
    }

    #[tokio::test]
    async fn test_double_settle_rejected() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        s.coordinator.settle(employee, vec![order]).await.unwrap();

        let result = s.coordinator.settle(employee, vec![order]).await;
        assert!(matches!(result, Err(FlowError::AlreadySettled(_))));

        // Still exactly one invoice, one expense, one payout
        assert_eq!(s.invoices.active_settlement_count(), 1);
        assert_eq!(s.expenses.expense_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_overlap_rejects_whole_batch() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let settled = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;
        let pending = record_profit(&s, &facts(employee, 20_000, 8_000, 20_000)).await;

        s.coordinator.settle(employee, vec![settled]).await.unwrap();
        let balance_before = s.ledger.get_balance(s.account_id).await.unwrap();

        let result = s.coordinator.settle(employee, vec![pending, settled]).await;
        assert!(matches!(result, Err(FlowError::AlreadySettled(_))));

        // The pending record is untouched and nothing new was paid out
        let record = s
            .coordinator
            .profits()
            .get_record(pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), ProfitStatus::Pending);
        assert_eq!(
            s.ledger.get_balance(s.account_id).await.unwrap(),
            balance_before
        );
        assert_eq!(s.invoices.active_settlement_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_order_rejected_before_any_side_effect() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        let result = s.coordinator.settle(employee, vec![order, order]).await;
        assert!(matches!(result, Err(FlowError::DuplicateOrder(id)) if id == order));

        // No invoice, no payout, no expense; the record is still pending
        assert_eq!(s.invoices.active_settlement_count(), 0);
        assert_eq!(s.expenses.expense_count(), 0);
        assert_eq!(
            s.ledger.get_balance(s.account_id).await.unwrap(),
            Money::from_cents(1_000_000)
        );
        let record = s
            .coordinator
            .profits()
            .get_record(order)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), ProfitStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_invoices_after_settlements() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let other = EmployeeId::new();
        let first = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;
        let second = record_profit(&s, &facts(employee, 20_000, 8_000, 20_000)).await;
        let foreign = record_profit(&s, &facts(other, 30_000, 9_000, 30_000)).await;

        let early = s.coordinator.settle(employee, vec![first]).await.unwrap();
        let late = s.coordinator.settle(employee, vec![second]).await.unwrap();
        s.coordinator.settle(other, vec![foreign]).await.unwrap();

        let invoices = s.coordinator.list_invoices(employee).await.unwrap();

        assert_eq!(invoices.len(), 2);
        assert!(invoices[0].created_at >= invoices[1].created_at);
        let numbers: Vec<&str> = invoices.iter().map(|i| i.number.as_str()).collect();
        assert!(numbers.contains(&early.invoice_number.as_str()));
        assert!(numbers.contains(&late.invoice_number.as_str()));
    }

    #[tokio::test]
    async fn test_foreign_record_rejected() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let owner = EmployeeId::new();
        let stranger = EmployeeId::new();
        let order = record_profit(&s, &facts(owner, 10_000, 5_000, 10_000)).await;

        let result = s.coordinator.settle(stranger, vec![order]).await;
        assert!(matches!(result, Err(FlowError::NotOwner { .. })));
        assert_eq!(s.invoices.active_settlement_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_rejected() {
        let s = setup(Money::from_cents(1_000_000)).await;

        let result = s
            .coordinator
            .settle(EmployeeId::new(), vec![OrderId::new()])
            .await;
        assert!(matches!(result, Err(FlowError::ProfitRecordMissing(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let s = setup(Money::from_cents(1_000_000)).await;

        let result = s.coordinator.settle(EmployeeId::new(), vec![]).await;
        assert!(matches!(result, Err(FlowError::NothingToSettle)));
    }

    #[tokio::test]
    async fn test_expense_failure_compensates_everything() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        s.expenses.set_fail_on_record(true);

        let result = s.coordinator.settle(employee, vec![order]).await;
        assert!(matches!(result, Err(FlowError::ExpenseService(_))));

        // Record back to pending, payout refunded, invoice voided
        let record = s
            .coordinator
            .profits()
            .get_record(order)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), ProfitStatus::Pending);
        assert_eq!(
            s.ledger.get_balance(s.account_id).await.unwrap(),
            Money::from_cents(1_000_000)
        );
        assert_eq!(s.invoices.active_settlement_count(), 0);
    }

    #[tokio::test]
    async fn test_invoice_failure_leaves_records_pending() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        s.invoices.set_fail_on_settlement(true);

        let result = s.coordinator.settle(employee, vec![order]).await;
        assert!(matches!(result, Err(FlowError::InvoiceService(_))));

        let record = s
            .coordinator
            .profits()
            .get_record(order)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), ProfitStatus::Pending);
        assert_eq!(s.expenses.expense_count(), 0);
    }

    #[tokio::test]
    async fn test_settlement_retryable_after_compensation() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        s.expenses.set_fail_on_record(true);
        let result = s.coordinator.settle(employee, vec![order]).await;
        assert!(result.is_err());

        s.expenses.set_fail_on_record(false);
        let outcome = s.coordinator.settle(employee, vec![order]).await.unwrap();

        let record = s
            .coordinator
            .profits()
            .get_record(order)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), ProfitStatus::Settled);
        assert_eq!(record.settled_at(), Some(outcome.settled_at));
    }

    #[tokio::test]
    async fn test_flow_journaled() {
        let s = setup(Money::from_cents(1_000_000)).await;
        let employee = EmployeeId::new();
        let order = record_profit(&s, &facts(employee, 10_000, 5_000, 10_000)).await;

        let outcome = s.coordinator.settle(employee, vec![order]).await.unwrap();

        let flow = s
            .coordinator
            .get_flow(outcome.flow_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(flow.state(), FlowState::Completed);
        assert_eq!(flow.flow_type(), flows::SETTLEMENT_FLOW);
        assert_eq!(flow.invoice_id(), Some(outcome.invoice_number.as_str()));
        assert_eq!(flow.completed_steps().len(), 5);
    }
}
