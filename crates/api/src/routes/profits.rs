//! Profit record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, OrderFacts, OrderLine, OrderStatus, ProfitRecord, SellerRole};
use journal::Journal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::{Actor, AppState, parse_employee_id, parse_order_id};

// -- Request types --

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RecordProfitRequest {
    pub order_id: String,
    pub employee_id: String,
    pub seller_role: String,
    pub lines: Vec<OrderLineRequest>,
    pub final_amount_cents: i64,
    #[serde(default)]
    pub delivery_fee_cents: i64,
    pub status: String,
    #[serde(default)]
    pub receipt_received: bool,
    pub sold_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub employee_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProfitRecordResponse {
    pub order_id: String,
    pub employee_id: String,
    pub seller_role: String,
    pub revenue_cents: i64,
    pub delivery_fee_cents: i64,
    pub total_cost_cents: i64,
    pub total_profit_cents: i64,
    pub employee_profit_cents: i64,
    pub system_profit_cents: i64,
    pub sold_at: String,
    pub status: String,
    pub settled_at: Option<String>,
    pub invoice_id: Option<String>,
}

#[derive(Serialize)]
pub struct PendingDuesResponse {
    pub employee_id: String,
    pub records: Vec<ProfitRecordResponse>,
    pub total_pending_cents: i64,
}

fn record_response(record: &ProfitRecord) -> Result<ProfitRecordResponse, ApiError> {
    let (Some(order_id), Some(employee_id), Some(seller_role), Some(breakdown), Some(sold_at)) = (
        record.order_id(),
        record.employee_id(),
        record.seller_role(),
        record.breakdown(),
        record.sold_at(),
    ) else {
        return Err(ApiError::Internal(
            "Profit record has no recorded sale".to_string(),
        ));
    };

    Ok(ProfitRecordResponse {
        order_id: order_id.to_string(),
        employee_id: employee_id.to_string(),
        seller_role: format!("{:?}", seller_role),
        revenue_cents: breakdown.revenue_excl_delivery.cents(),
        delivery_fee_cents: record.delivery_fee().cents(),
        total_cost_cents: breakdown.total_cost.cents(),
        total_profit_cents: breakdown.total_profit.cents(),
        employee_profit_cents: breakdown.employee_profit.cents(),
        system_profit_cents: breakdown.system_profit.cents(),
        sold_at: sold_at.to_rfc3339(),
        status: format!("{:?}", record.status()),
        settled_at: record.settled_at().map(|ts| ts.to_rfc3339()),
        invoice_id: record.invoice_id().map(|id| id.to_string()),
    })
}

fn summary_response(summary: &projections::ProfitRecordSummary) -> ProfitRecordResponse {
    ProfitRecordResponse {
        order_id: summary.order_id.to_string(),
        employee_id: summary.employee_id.to_string(),
        seller_role: format!("{:?}", summary.seller_role),
        revenue_cents: summary.revenue.cents(),
        delivery_fee_cents: summary.delivery_fee.cents(),
        total_cost_cents: summary.total_cost.cents(),
        total_profit_cents: summary.total_profit.cents(),
        employee_profit_cents: summary.employee_profit.cents(),
        system_profit_cents: summary.system_profit.cents(),
        sold_at: summary.sold_at.to_rfc3339(),
        status: format!("{:?}", summary.status),
        settled_at: summary.settled_at.map(|ts| ts.to_rfc3339()),
        invoice_id: summary.invoice_id.map(|id| id.to_string()),
    }
}

fn parse_seller_role(raw: &str) -> Result<SellerRole, ApiError> {
    match raw {
        "employee" => Ok(SellerRole::Employee),
        "manager" => Ok(SellerRole::Manager),
        other => Err(ApiError::BadRequest(format!(
            "Invalid seller role '{other}' (expected 'employee' or 'manager')"
        ))),
    }
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ApiError> {
    match raw {
        "pending" => Ok(OrderStatus::Pending),
        "delivered" => Ok(OrderStatus::Delivered),
        "returned" => Ok(OrderStatus::Returned),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(ApiError::BadRequest(format!(
            "Invalid order status '{other}'"
        ))),
    }
}

// -- Handlers --

/// POST /profits — record an order's profit shares.
#[tracing::instrument(skip(state, req))]
pub async fn record<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Json(req): Json<RecordProfitRequest>,
) -> Result<(StatusCode, Json<ProfitRecordResponse>), ApiError> {
    let facts = OrderFacts {
        order_id: parse_order_id(&req.order_id)?,
        created_by: parse_employee_id(&req.employee_id)?,
        seller_role: parse_seller_role(&req.seller_role)?,
        lines: req
            .lines
            .iter()
            .map(|l| {
                OrderLine::new(
                    Money::from_cents(l.unit_price_cents),
                    Money::from_cents(l.cost_price_cents),
                    l.quantity,
                )
            })
            .collect(),
        final_amount: Money::from_cents(req.final_amount_cents),
        delivery_fee: Money::from_cents(req.delivery_fee_cents),
        status: parse_order_status(&req.status)?,
        receipt_received: req.receipt_received,
        sold_at: req.sold_at.unwrap_or_else(Utc::now),
    };

    let result = state.profits.record_order_profit(&facts).await?;

    Ok((
        StatusCode::CREATED,
        Json(record_response(&result.aggregate)?),
    ))
}

/// GET /profits/pending — an employee's unsettled dues.
#[tracing::instrument(skip(state, headers))]
pub async fn pending<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    headers: HeaderMap,
    Query(query): Query<PendingQuery>,
) -> Result<Json<PendingDuesResponse>, ApiError> {
    let actor = Actor::from_headers(&headers)?;

    let employee_id = match (&query.employee_id, actor.can_view_all, actor.employee_id) {
        (Some(raw), true, _) => parse_employee_id(raw)?,
        (Some(raw), false, _) => {
            let requested = parse_employee_id(raw)?;
            if !actor.may_access(requested) {
                return Err(ApiError::Forbidden(
                    "Cannot view another employee's dues".to_string(),
                ));
            }
            requested
        }
        (None, _, Some(own)) => own,
        (None, _, None) => {
            return Err(ApiError::BadRequest(
                "x-actor-id header required".to_string(),
            ));
        }
    };

    state
        .processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let records = state.records.pending_for(employee_id).await;
    let total = state.records.total_pending_dues(employee_id).await;

    Ok(Json(PendingDuesResponse {
        employee_id: employee_id.to_string(),
        records: records.iter().map(summary_response).collect(),
        total_pending_cents: total.cents(),
    }))
}

/// GET /profits/:order_id — one order's profit record.
#[tracing::instrument(skip(state, headers))]
pub async fn get<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<ProfitRecordResponse>, ApiError> {
    let actor = Actor::from_headers(&headers)?;
    let order_id: OrderId = parse_order_id(&order_id)?;

    let record = state
        .profits
        .get_record(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Profit record for order {order_id} not found")))?;

    let owner = record.employee_id().ok_or_else(|| {
        ApiError::Internal(format!("Profit record for order {order_id} has no owner"))
    })?;
    if !actor.may_access(owner) {
        return Err(ApiError::Forbidden(
            "Cannot view another employee's profit record".to_string(),
        ));
    }

    Ok(Json(record_response(&record)?))
}
