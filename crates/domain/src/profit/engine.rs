//! Pure profit computation over order facts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{EmployeeId, OrderId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Role of the person who made a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SellerRole {
    /// Business owner; sales accrue to the system.
    Manager,

    /// Staff member entitled to a profit share.
    Employee,
}

/// Lifecycle status of a sale order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order placed but not yet delivered.
    Pending,

    /// Order delivered to the customer.
    Delivered,

    /// Order returned by the customer.
    Returned,

    /// Order cancelled before delivery.
    Cancelled,
}

/// A line on a sale order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Selling price per unit.
    pub unit_price: Money,

    /// Acquisition cost per unit.
    pub cost_price: Money,

    /// Quantity sold.
    pub quantity: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(unit_price: Money, cost_price: Money, quantity: u32) -> Self {
        Self {
            unit_price,
            cost_price,
            quantity,
        }
    }

    /// Total acquisition cost for this line (cost_price * quantity).
    pub fn total_cost(&self) -> Money {
        self.cost_price.multiply(self.quantity)
    }
}

/// The facts about a sale order that profit computation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFacts {
    /// The order being computed over.
    pub order_id: OrderId,

    /// The employee who created the order.
    pub created_by: EmployeeId,

    /// Role of the seller.
    pub seller_role: SellerRole,

    /// Lines on the order.
    pub lines: Vec<OrderLine>,

    /// Final amount the customer paid, delivery included.
    pub final_amount: Money,

    /// Delivery fee included in the final amount.
    pub delivery_fee: Money,

    /// Current order status.
    pub status: OrderStatus,

    /// Whether a payment receipt has been received.
    pub receipt_received: bool,

    /// When the sale happened.
    pub sold_at: DateTime<Utc>,
}

impl OrderFacts {
    /// Total acquisition cost across all lines.
    pub fn total_cost(&self) -> Money {
        self.lines.iter().map(OrderLine::total_cost).sum()
    }

    /// Returns true if the order qualifies for profit recording:
    /// delivered, with a payment receipt on file.
    pub fn is_fulfilled(&self) -> bool {
        self.status == OrderStatus::Delivered && self.receipt_received
    }
}

/// Per-employee profit share rules, in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRules {
    /// Share applied when no override exists for the employee.
    default_bps: u32,

    /// Per-employee overrides.
    overrides: HashMap<EmployeeId, u32>,
}

/// Default employee share: 30%.
const DEFAULT_SHARE_BPS: u32 = 3_000;

impl ShareRules {
    /// Creates share rules with the given default.
    pub fn new(default_bps: u32) -> Self {
        Self {
            default_bps,
            overrides: HashMap::new(),
        }
    }

    /// Sets an override share for a specific employee.
    pub fn with_override(mut self, employee_id: EmployeeId, bps: u32) -> Self {
        self.overrides.insert(employee_id, bps);
        self
    }

    /// Returns the share for an employee, in basis points.
    pub fn share_bps(&self, employee_id: EmployeeId) -> u32 {
        self.overrides
            .get(&employee_id)
            .copied()
            .unwrap_or(self.default_bps)
    }
}

impl Default for ShareRules {
    fn default() -> Self {
        Self::new(DEFAULT_SHARE_BPS)
    }
}

/// Computed profit split for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    /// Sum of cost_price * quantity over the order lines.
    pub total_cost: Money,

    /// Final amount minus the delivery fee.
    pub revenue_excl_delivery: Money,

    /// Revenue excluding delivery minus total cost.
    pub total_profit: Money,

    /// The employee's share of the total profit.
    pub employee_profit: Money,

    /// Whatever remains after the employee's share.
    pub system_profit: Money,
}

/// Computes profit splits from order facts.
///
/// All arithmetic is in integer cents. The employee share truncates toward
/// zero; the system share is the exact remainder, so the two always sum to
/// the total. Negative profits are carried through unclamped.
#[derive(Debug, Clone, Default)]
pub struct ProfitEngine {
    rules: ShareRules,
}

impl ProfitEngine {
    /// Creates an engine with the given share rules.
    pub fn new(rules: ShareRules) -> Self {
        Self { rules }
    }

    /// Returns the share rules.
    pub fn rules(&self) -> &ShareRules {
        &self.rules
    }

    /// Computes the profit breakdown for an order.
    pub fn compute(&self, facts: &OrderFacts) -> ProfitBreakdown {
        let total_cost = facts.total_cost();
        let revenue_excl_delivery = facts.final_amount - facts.delivery_fee;
        let total_profit = revenue_excl_delivery - total_cost;

        let bps = match facts.seller_role {
            SellerRole::Manager => 0,
            SellerRole::Employee => self.rules.share_bps(facts.created_by),
        };

        let employee_profit = Money::from_cents(total_profit.cents() * bps as i64 / 10_000);
        let system_profit = total_profit - employee_profit;

        ProfitBreakdown {
            total_cost,
            revenue_excl_delivery,
            total_profit,
            employee_profit,
            system_profit,
        }
    }
}
