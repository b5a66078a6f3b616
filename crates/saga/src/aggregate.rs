//! Flow instance aggregate.

use common::AggregateId;
use domain::Aggregate;
use journal::Version;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::events::FlowEvent;
use crate::state::FlowState;

/// An event-sourced flow instance.
///
/// Tracks the progress of a flow execution including completed steps and
/// context accumulated along the way (invoice numbers, movement IDs,
/// expense row IDs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowInstance {
    id: Option<AggregateId>,
    version: Version,
    flow_type: String,
    subject: String,
    state: FlowState,
    current_step: usize,
    completed_steps: Vec<String>,
    /// Invoice number created by the flow.
    invoice_id: Option<String>,
    /// Ledger movement ID recorded by the flow.
    movement_id: Option<String>,
    /// Expense row IDs recorded by the flow.
    expense_ids: Vec<String>,
    /// Reason for failure, if any.
    failure_reason: Option<String>,
}

impl Aggregate for FlowInstance {
    type Event = FlowEvent;
    type Error = FlowError;

    fn aggregate_type() -> &'static str {
        "Flow"
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
            FlowEvent::FlowStarted(data) => {
                self.id = Some(data.flow_id);
                self.flow_type = data.flow_type;
                self.subject = data.subject;
                self.state = FlowState::Running;
            }
            FlowEvent::StepStarted(_) => {
                self.current_step += 1;
            }
            FlowEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name);
                if let Some(id) = data.invoice_id {
                    self.invoice_id = Some(id);
                }
                if let Some(id) = data.movement_id {
                    self.movement_id = Some(id);
                }
                self.expense_ids.extend(data.expense_ids);
            }
            FlowEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            FlowEvent::CompensationStarted(_) => {
                self.state = FlowState::Compensating;
            }
            FlowEvent::CompensationStepCompleted(_) => {
                // Progress recorded; no state change needed
            }
            FlowEvent::CompensationStepFailed(_) => {
                // Compensation failures are recorded but don't stop the chain
            }
            FlowEvent::FlowCompleted(_) => {
                self.state = FlowState::Completed;
            }
            FlowEvent::FlowFailed(data) => {
                self.state = FlowState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl FlowInstance {
    /// Returns the flow state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Returns the flow type.
    pub fn flow_type(&self) -> &str {
        &self.flow_type
    }

    /// Returns what the flow operates on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the list of completed step names.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the invoice number, if set.
    pub fn invoice_id(&self) -> Option<&str> {
        self.invoice_id.as_deref()
    }

    /// Returns the ledger movement ID, if set.
    pub fn movement_id(&self) -> Option<&str> {
        self.movement_id.as_deref()
    }

    /// Returns the expense row IDs recorded by the flow.
    pub fn expense_ids(&self) -> &[String] {
        &self.expense_ids
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}
