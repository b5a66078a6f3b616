//! Profit computation and the profit record aggregate.

mod engine;
mod events;
mod record;
mod service;

pub use engine::{
    OrderFacts, OrderLine, OrderStatus, ProfitBreakdown, ProfitEngine, SellerRole, ShareRules,
};
pub use events::{
    ProfitEvent, ProfitRecordedData, ProfitSettledData, SettlementRevertedData,
};
pub use record::{ProfitRecord, ProfitStatus, profit_stream_id};
pub use service::ProfitService;

use common::{EmployeeId, OrderId};
use thiserror::Error;

/// Errors that can occur during profit operations.
#[derive(Debug, Error)]
pub enum ProfitError {
    /// Profit has already been recorded for this order.
    #[error("Profit already recorded for order {order_id}")]
    AlreadyRecorded { order_id: OrderId },

    /// No profit record exists yet.
    #[error("Profit not recorded")]
    NotRecorded,

    /// The order does not qualify for profit recording.
    #[error("Order {order_id} is not fulfilled")]
    NotFulfilled { order_id: OrderId },

    /// The record was already settled.
    #[error("Profit for order {order_id} already settled")]
    AlreadySettled { order_id: OrderId },

    /// A different employee owns this record.
    #[error("Profit for order {order_id} does not belong to employee {claimant}")]
    NotOwner {
        order_id: OrderId,
        claimant: EmployeeId,
    },

    /// The record is not settled, so there is nothing to revert.
    #[error("Profit record is not settled")]
    NotSettled,
}
