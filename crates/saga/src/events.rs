//! Flow domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::DomainEvent;
use serde::{Deserialize, Serialize};

/// Events that can occur during flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FlowEvent {
    /// Flow execution started.
    FlowStarted(FlowStartedData),

    /// A flow step started execution.
    StepStarted(StepData),

    /// A flow step completed successfully.
    StepCompleted(StepCompletedData),

    /// A flow step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensating action completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensating action failed (recorded, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Flow completed successfully.
    FlowCompleted(FlowCompletedData),

    /// Flow failed after compensation.
    FlowFailed(FlowFailedData),
}

impl DomainEvent for FlowEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FlowEvent::FlowStarted(_) => "FlowStarted",
            FlowEvent::StepStarted(_) => "StepStarted",
            FlowEvent::StepCompleted(_) => "StepCompleted",
            FlowEvent::StepFailed(_) => "StepFailed",
            FlowEvent::CompensationStarted(_) => "CompensationStarted",
            FlowEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            FlowEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            FlowEvent::FlowCompleted(_) => "FlowCompleted",
            FlowEvent::FlowFailed(_) => "FlowFailed",
        }
    }
}

/// Data for FlowStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStartedData {
    /// The flow instance ID.
    pub flow_id: AggregateId,
    /// The type of flow (e.g., "PurchaseInvoicing").
    pub flow_type: String,
    /// What the flow operates on (invoice number, employee ID).
    pub subject: String,
    /// When the flow started.
    pub started_at: DateTime<Utc>,
}

/// Data for step started / compensation step completed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    /// The step name.
    pub step_name: String,
}

/// Data for StepCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    /// The step name.
    pub step_name: String,
    /// Invoice number (set after the create_invoice step).
    pub invoice_id: Option<String>,
    /// Ledger movement ID (set after payment/payout steps).
    pub movement_id: Option<String>,
    /// Expense row IDs (set after expense steps).
    pub expense_ids: Vec<String>,
}

/// Data for StepFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step_name: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for FlowCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCompletedData {
    /// When the flow completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for FlowFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowFailedData {
    /// Reason for failure.
    pub reason: String,
    /// When the flow failed.
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl FlowEvent {
    /// Creates a FlowStarted event.
    pub fn flow_started(
        flow_id: AggregateId,
        flow_type: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        FlowEvent::FlowStarted(FlowStartedData {
            flow_id,
            flow_type: flow_type.into(),
            subject: subject.into(),
            started_at: Utc::now(),
        })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        FlowEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a StepCompleted event with no context.
    pub fn step_completed(step_name: impl Into<String>) -> Self {
        FlowEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            invoice_id: None,
            movement_id: None,
            expense_ids: Vec::new(),
        })
    }

    /// Creates a StepCompleted event carrying an invoice number.
    pub fn step_completed_invoice(
        step_name: impl Into<String>,
        invoice_id: impl Into<String>,
    ) -> Self {
        FlowEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            invoice_id: Some(invoice_id.into()),
            movement_id: None,
            expense_ids: Vec::new(),
        })
    }

    /// Creates a StepCompleted event carrying a ledger movement ID.
    pub fn step_completed_movement(
        step_name: impl Into<String>,
        movement_id: impl Into<String>,
    ) -> Self {
        FlowEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            invoice_id: None,
            movement_id: Some(movement_id.into()),
            expense_ids: Vec::new(),
        })
    }

    /// Creates a StepCompleted event carrying expense row IDs.
    pub fn step_completed_expenses(
        step_name: impl Into<String>,
        expense_ids: Vec<String>,
    ) -> Self {
        FlowEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            invoice_id: None,
            movement_id: None,
            expense_ids,
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        FlowEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        FlowEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        FlowEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        FlowEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a FlowCompleted event.
    pub fn flow_completed() -> Self {
        FlowEvent::FlowCompleted(FlowCompletedData {
            completed_at: Utc::now(),
        })
    }

    /// Creates a FlowFailed event.
    pub fn flow_failed(reason: impl Into<String>) -> Self {
        FlowEvent::FlowFailed(FlowFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows;

    #[test]
    fn test_event_type() {
        let flow_id = AggregateId::new();

        assert_eq!(
            FlowEvent::flow_started(flow_id, flows::PURCHASE_FLOW, "PI-0001").event_type(),
            "FlowStarted"
        );
        assert_eq!(
            FlowEvent::step_started(flows::STEP_APPLY_STOCK).event_type(),
            "StepStarted"
        );
        assert_eq!(
            FlowEvent::step_completed_invoice(flows::STEP_CREATE_INVOICE, "RY-000001")
                .event_type(),
            "StepCompleted"
        );
        assert_eq!(
            FlowEvent::step_failed(flows::STEP_APPLY_STOCK, "unknown SKU").event_type(),
            "StepFailed"
        );
        assert_eq!(
            FlowEvent::compensation_started(flows::STEP_RECORD_PAYMENT).event_type(),
            "CompensationStarted"
        );
        assert_eq!(
            FlowEvent::compensation_step_completed(flows::STEP_APPLY_STOCK).event_type(),
            "CompensationStepCompleted"
        );
        assert_eq!(
            FlowEvent::compensation_step_failed(flows::STEP_APPLY_STOCK, "service down")
                .event_type(),
            "CompensationStepFailed"
        );
        assert_eq!(FlowEvent::flow_completed().event_type(), "FlowCompleted");
        assert_eq!(
            FlowEvent::flow_failed("step failed").event_type(),
            "FlowFailed"
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let flow_id = AggregateId::new();

        let events = vec![
            FlowEvent::flow_started(flow_id, flows::SETTLEMENT_FLOW, "employee"),
            FlowEvent::step_started(flows::STEP_CHECK_RECORDS),
            FlowEvent::step_completed(flows::STEP_CHECK_RECORDS),
            FlowEvent::step_completed_invoice(flows::STEP_CREATE_INVOICE, "RY-000001"),
            FlowEvent::step_completed_movement(flows::STEP_RECORD_PAYOUT, "mv-1"),
            FlowEvent::step_completed_expenses(
                flows::STEP_RECORD_DUES,
                vec!["EXP-0001".to_string()],
            ),
            FlowEvent::step_failed(flows::STEP_RECORD_PAYOUT, "insufficient funds"),
            FlowEvent::compensation_started(flows::STEP_RECORD_PAYOUT),
            FlowEvent::compensation_step_completed(flows::STEP_SETTLE_RECORDS),
            FlowEvent::compensation_step_failed(flows::STEP_SETTLE_RECORDS, "timeout"),
            FlowEvent::flow_completed(),
            FlowEvent::flow_failed("payout failed"),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let deserialized: FlowEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.event_type(), deserialized.event_type());
        }
    }

    #[test]
    fn test_flow_started_data() {
        let flow_id = AggregateId::new();
        let event = FlowEvent::flow_started(flow_id, flows::PURCHASE_FLOW, "PI-0042");

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: FlowEvent = serde_json::from_str(&json).unwrap();

        if let FlowEvent::FlowStarted(data) = deserialized {
            assert_eq!(data.flow_id, flow_id);
            assert_eq!(data.flow_type, flows::PURCHASE_FLOW);
            assert_eq!(data.subject, "PI-0042");
        } else {
            panic!("Expected FlowStarted event");
        }
    }

    #[test]
    fn test_step_completed_context() {
        let event = FlowEvent::step_completed_expenses(
            flows::STEP_RECORD_EXPENSES,
            vec!["EXP-0001".to_string(), "EXP-0002".to_string()],
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: FlowEvent = serde_json::from_str(&json).unwrap();

        if let FlowEvent::StepCompleted(data) = deserialized {
            assert_eq!(data.step_name, flows::STEP_RECORD_EXPENSES);
            assert_eq!(data.expense_ids.len(), 2);
            assert!(data.invoice_id.is_none());
            assert!(data.movement_id.is_none());
        } else {
            panic!("Expected StepCompleted event");
        }
    }
}
