//! Stock service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::Money;

use crate::error::FlowError;

/// Stock position for a single SKU.
#[derive(Debug, Clone, Copy)]
pub struct StockLevel {
    /// On-hand quantity. May go negative after a purchase deletion.
    pub quantity: i64,
    /// Unit cost from the most recent purchase (last cost wins).
    pub last_cost: Money,
}

/// Trait for stock management operations.
#[async_trait]
pub trait StockService: Send + Sync {
    /// Increments the stock of a known SKU and updates its last cost.
    ///
    /// Fails with [`FlowError::StockUpdate`] when the SKU is not registered.
    async fn increment(
        &self,
        sku: &str,
        quantity: u32,
        unit_cost: Money,
    ) -> Result<(), FlowError>;

    /// Decrements the stock of a SKU. Never fails: quantities may go
    /// negative and unknown SKUs start from zero.
    async fn decrement(&self, sku: &str, quantity: u32) -> Result<(), FlowError>;

    /// Returns the current stock level for a SKU, if tracked.
    async fn level(&self, sku: &str) -> Result<Option<StockLevel>, FlowError>;
}

#[derive(Debug, Default)]
struct InMemoryStockState {
    levels: HashMap<String, StockLevel>,
    fail_on_increment: bool,
}

/// In-memory stock service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockService {
    state: Arc<RwLock<InMemoryStockState>>,
}

impl InMemoryStockService {
    /// Creates a new in-memory stock service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a SKU with an initial quantity and cost.
    pub fn register_product(&self, sku: impl Into<String>, quantity: i64, cost: Money) {
        self.state.write().unwrap().levels.insert(
            sku.into(),
            StockLevel {
                quantity,
                last_cost: cost,
            },
        );
    }

    /// Configures the service to fail on the next increment call.
    pub fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().unwrap().fail_on_increment = fail;
    }

    /// Returns the on-hand quantity for a SKU, if tracked.
    pub fn quantity_of(&self, sku: &str) -> Option<i64> {
        self.state
            .read()
            .unwrap()
            .levels
            .get(sku)
            .map(|level| level.quantity)
    }

    /// Returns the last recorded unit cost for a SKU, if tracked.
    pub fn last_cost_of(&self, sku: &str) -> Option<Money> {
        self.state
            .read()
            .unwrap()
            .levels
            .get(sku)
            .map(|level| level.last_cost)
    }
}

#[async_trait]
impl StockService for InMemoryStockService {
    async fn increment(
        &self,
        sku: &str,
        quantity: u32,
        unit_cost: Money,
    ) -> Result<(), FlowError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_increment {
            return Err(FlowError::StockUpdate {
                sku: sku.to_string(),
                reason: "Stock service unavailable".to_string(),
            });
        }

        match state.levels.get_mut(sku) {
            Some(level) => {
                level.quantity += i64::from(quantity);
                level.last_cost = unit_cost;
                Ok(())
            }
            None => Err(FlowError::StockUpdate {
                sku: sku.to_string(),
                reason: "Unknown SKU".to_string(),
            }),
        }
    }

    async fn decrement(&self, sku: &str, quantity: u32) -> Result<(), FlowError> {
        let mut state = self.state.write().unwrap();

        let level = state.levels.entry(sku.to_string()).or_insert(StockLevel {
            quantity: 0,
            last_cost: Money::zero(),
        });
        level.quantity -= i64::from(quantity);

        Ok(())
    }

    async fn level(&self, sku: &str) -> Result<Option<StockLevel>, FlowError> {
        Ok(self.state.read().unwrap().levels.get(sku).copied())
    }
}
