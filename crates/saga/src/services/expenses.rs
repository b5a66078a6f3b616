//! Expense service trait and in-memory implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Category of an expense row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    /// Cost of purchased goods.
    Goods,
    /// Shipping fee on a purchase.
    Shipping,
    /// Bank transfer fee on a purchase.
    Transfer,
    /// Profit share paid out to an employee.
    EmployeeDues,
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseCategory::Goods => write!(f, "goods"),
            ExpenseCategory::Shipping => write!(f, "shipping"),
            ExpenseCategory::Transfer => write!(f, "transfer"),
            ExpenseCategory::EmployeeDues => write!(f, "employee dues"),
        }
    }
}

/// A recorded expense row.
#[derive(Debug, Clone)]
pub struct ExpenseRecord {
    /// The expense row ID assigned by the expense service.
    pub expense_id: String,
    /// Expense category.
    pub category: ExpenseCategory,
    /// Amount of the expense.
    pub amount: Money,
    /// Human-readable description.
    pub description: String,
    /// Invoice number this expense belongs to, if any.
    pub reference: Option<String>,
    /// When the expense was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Trait for expense bookkeeping operations.
#[async_trait]
pub trait ExpenseService: Send + Sync {
    /// Records an expense row and returns its ID.
    async fn record(
        &self,
        category: ExpenseCategory,
        amount: Money,
        description: &str,
        reference: Option<String>,
    ) -> Result<String, FlowError>;

    /// Removes a single expense row.
    async fn remove(&self, expense_id: &str) -> Result<(), FlowError>;

    /// Removes every expense row carrying the given reference. Returns
    /// how many rows were removed.
    async fn remove_by_reference(&self, reference: &str) -> Result<usize, FlowError>;
}

#[derive(Debug, Default)]
struct InMemoryExpenseState {
    expenses: HashMap<String, ExpenseRecord>,
    next_id: u32,
    fail_on_record: bool,
}

/// In-memory expense service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExpenseService {
    state: Arc<RwLock<InMemoryExpenseState>>,
}

impl InMemoryExpenseService {
    /// Creates a new in-memory expense service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on the next record call.
    pub fn set_fail_on_record(&self, fail: bool) {
        self.state.write().unwrap().fail_on_record = fail;
    }

    /// Returns the number of recorded expense rows.
    pub fn expense_count(&self) -> usize {
        self.state.read().unwrap().expenses.len()
    }

    /// Returns true if an expense row exists with the given ID.
    pub fn has_expense(&self, expense_id: &str) -> bool {
        self.state.read().unwrap().expenses.contains_key(expense_id)
    }

    /// Returns the sum of all expense rows in a category.
    pub fn total_for_category(&self, category: ExpenseCategory) -> Money {
        self.state
            .read()
            .unwrap()
            .expenses
            .values()
            .filter(|expense| expense.category == category)
            .map(|expense| expense.amount)
            .sum()
    }

    /// Returns all expense rows carrying the given reference.
    pub fn expenses_for_reference(&self, reference: &str) -> Vec<ExpenseRecord> {
        self.state
            .read()
            .unwrap()
            .expenses
            .values()
            .filter(|expense| expense.reference.as_deref() == Some(reference))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExpenseService for InMemoryExpenseService {
    async fn record(
        &self,
        category: ExpenseCategory,
        amount: Money,
        description: &str,
        reference: Option<String>,
    ) -> Result<String, FlowError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_record {
            return Err(FlowError::ExpenseService(
                "Expense service unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let expense_id = format!("EXP-{:04}", state.next_id);
        state.expenses.insert(
            expense_id.clone(),
            ExpenseRecord {
                expense_id: expense_id.clone(),
                category,
                amount,
                description: description.to_string(),
                reference,
                recorded_at: Utc::now(),
            },
        );

        Ok(expense_id)
    }

    async fn remove(&self, expense_id: &str) -> Result<(), FlowError> {
        let mut state = self.state.write().unwrap();
        state.expenses.remove(expense_id);
        Ok(())
    }

    async fn remove_by_reference(&self, reference: &str) -> Result<usize, FlowError> {
        let mut state = self.state.write().unwrap();
        let before = state.expenses.len();
        state
            .expenses
            .retain(|_, expense| expense.reference.as_deref() != Some(reference));
        Ok(before - state.expenses.len())
    }
}
