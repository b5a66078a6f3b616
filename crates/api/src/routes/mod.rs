//! Route handlers and shared application state.

pub mod accounts;
pub mod health;
pub mod metrics;
pub mod profits;
pub mod purchases;
pub mod reports;
pub mod settlements;

use std::sync::Arc;

use axum::http::HeaderMap;
use common::{AggregateId, EmployeeId, OrderId};
use domain::{LedgerService, ProfitService};
use journal::Journal;
use projections::{
    AccountBalancesView, FinancialSummaryView, ProfitRecordsView, ProjectionProcessor,
};
use saga::{
    InMemoryExpenseService, InMemoryInvoiceService, InMemoryStockService, PurchaseCoordinator,
    SettlementCoordinator,
};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<J: Journal> {
    pub ledger: LedgerService<J>,
    pub profits: ProfitService<J>,
    pub purchases:
        PurchaseCoordinator<J, InMemoryStockService, InMemoryExpenseService, InMemoryInvoiceService>,
    pub settlements: SettlementCoordinator<J, InMemoryExpenseService, InMemoryInvoiceService>,
    pub operating_account: AggregateId,
    pub stock: InMemoryStockService,
    pub expenses: InMemoryExpenseService,
    pub invoices: InMemoryInvoiceService,
    pub balances: AccountBalancesView,
    pub records: ProfitRecordsView,
    pub summaries: FinancialSummaryView,
    pub processor: Arc<ProjectionProcessor<J>>,
}

/// Caller identity taken from request headers.
///
/// Authentication itself happens upstream; these headers only scope which
/// profit records the caller may query or settle.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub employee_id: Option<EmployeeId>,
    pub can_view_all: bool,
}

impl Actor {
    /// Parses the `x-actor-id` and `x-can-view-all` headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let employee_id = match headers.get("x-actor-id") {
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    ApiError::BadRequest("Invalid x-actor-id header".to_string())
                })?;
                let uuid = uuid::Uuid::parse_str(raw)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid x-actor-id: {e}")))?;
                Some(EmployeeId::from_uuid(uuid))
            }
            None => None,
        };

        let can_view_all = headers
            .get("x-can-view-all")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            employee_id,
            can_view_all,
        })
    }

    /// Whether the caller may touch records owned by `owner`.
    pub fn may_access(&self, owner: EmployeeId) -> bool {
        self.can_view_all || self.employee_id == Some(owner)
    }
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}

pub(crate) fn parse_employee_id(id: &str) -> Result<EmployeeId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid employee ID: {e}")))?;
    Ok(EmployeeId::from_uuid(uuid))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        let actor = Actor::from_headers(&headers).unwrap();
        assert!(actor.employee_id.is_none());
        assert!(!actor.can_view_all);
    }

    #[test]
    fn test_actor_parses_headers() {
        let employee_id = EmployeeId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-actor-id",
            HeaderValue::from_str(&employee_id.to_string()).unwrap(),
        );
        headers.insert("x-can-view-all", HeaderValue::from_static("true"));

        let actor = Actor::from_headers(&headers).unwrap();
        assert_eq!(actor.employee_id, Some(employee_id));
        assert!(actor.can_view_all);
        assert!(actor.may_access(EmployeeId::new()));
    }

    #[test]
    fn test_actor_rejects_bad_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_static("not-a-uuid"));
        assert!(Actor::from_headers(&headers).is_err());
    }

    #[test]
    fn test_may_access_own_records_only() {
        let me = EmployeeId::new();
        let actor = Actor {
            employee_id: Some(me),
            can_view_all: false,
        };
        assert!(actor.may_access(me));
        assert!(!actor.may_access(EmployeeId::new()));
    }
}
