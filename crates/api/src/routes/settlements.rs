//! Settlement endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::AggregateId;
use journal::Journal;
use projections::ProfitRecordSummary;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::{Actor, AppState, parse_employee_id, parse_order_id};

// -- Request types --

#[derive(Deserialize)]
pub struct SettleRequest {
    pub employee_id: String,
    pub order_ids: Vec<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SettlementCreatedResponse {
    pub flow_id: String,
    pub invoice_id: String,
    pub invoice_number: String,
    pub total_cents: i64,
    pub settled_at: String,
}

#[derive(Serialize)]
pub struct SettlementResponse {
    pub invoice_id: String,
    pub employee_id: String,
    pub settled_at: String,
    pub total_cents: i64,
    pub order_ids: Vec<String>,
}

// -- Handlers --

/// POST /settlements — settle an employee's pending dues all-or-nothing.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    headers: HeaderMap,
    Json(req): Json<SettleRequest>,
) -> Result<(StatusCode, Json<SettlementCreatedResponse>), ApiError> {
    let actor = Actor::from_headers(&headers)?;
    let employee_id = parse_employee_id(&req.employee_id)?;

    if !actor.may_access(employee_id) {
        return Err(ApiError::Forbidden(
            "Cannot settle another employee's dues".to_string(),
        ));
    }

    let order_ids = req
        .order_ids
        .iter()
        .map(|raw| parse_order_id(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let outcome = state.settlements.settle(employee_id, order_ids).await?;

    Ok((
        StatusCode::CREATED,
        Json(SettlementCreatedResponse {
            flow_id: outcome.flow_id.to_string(),
            invoice_id: outcome.invoice_id.to_string(),
            invoice_number: outcome.invoice_number,
            total_cents: outcome.total.cents(),
            settled_at: outcome.settled_at.to_rfc3339(),
        }),
    ))
}

/// GET /settlements — past settlements, grouped by invoice.
#[tracing::instrument(skip(state, headers))]
pub async fn list<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SettlementResponse>>, ApiError> {
    let actor = Actor::from_headers(&headers)?;

    state
        .processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let rows = if actor.can_view_all {
        state.records.settled_records().await
    } else if let Some(me) = actor.employee_id {
        state.records.settled_for(me).await
    } else {
        return Err(ApiError::BadRequest(
            "x-actor-id header required".to_string(),
        ));
    };

    // Settled records sharing an invoice came from one settlement batch.
    let mut by_invoice: HashMap<AggregateId, Vec<&ProfitRecordSummary>> = HashMap::new();
    for row in &rows {
        if let Some(invoice_id) = row.invoice_id {
            by_invoice.entry(invoice_id).or_default().push(row);
        }
    }

    let mut settlements: Vec<SettlementResponse> = by_invoice
        .into_iter()
        .map(|(invoice_id, records)| {
            let settled_at: Option<DateTime<Utc>> = records.iter().find_map(|r| r.settled_at);
            let total: i64 = records.iter().map(|r| r.employee_profit.cents()).sum();
            SettlementResponse {
                invoice_id: invoice_id.to_string(),
                employee_id: records
                    .first()
                    .map(|r| r.employee_id.to_string())
                    .unwrap_or_default(),
                settled_at: settled_at.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
                total_cents: total,
                order_ids: records.iter().map(|r| r.order_id.to_string()).collect(),
            }
        })
        .collect();
    settlements.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));

    Ok(Json(settlements))
}
