//! Purchase invoicing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::Money;
use journal::Journal;
use saga::{PurchaseDraft, PurchaseInvoice};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PurchaseLineRequest {
    pub sku: String,
    pub quantity: u32,
    pub unit_cost_cents: i64,
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub supplier: String,
    pub lines: Vec<PurchaseLineRequest>,
    #[serde(default)]
    pub shipping_fee_cents: i64,
    #[serde(default)]
    pub transfer_fee_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseLineResponse {
    pub sku: String,
    pub quantity: u32,
    pub unit_cost_cents: i64,
}

#[derive(Serialize)]
pub struct PurchaseInvoiceResponse {
    pub invoice_id: String,
    pub supplier: String,
    pub lines: Vec<PurchaseLineResponse>,
    pub shipping_fee_cents: i64,
    pub transfer_fee_cents: i64,
    pub goods_total_cents: i64,
    pub total_cents: i64,
    pub created_at: String,
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct PurchaseCreatedResponse {
    pub flow_id: String,
    pub invoice: PurchaseInvoiceResponse,
}

#[derive(Serialize)]
pub struct PurchaseDeletedResponse {
    pub flow_id: String,
    pub invoice_id: String,
}

fn invoice_response(invoice: &PurchaseInvoice) -> PurchaseInvoiceResponse {
    PurchaseInvoiceResponse {
        invoice_id: invoice.invoice_id.clone(),
        supplier: invoice.supplier.clone(),
        lines: invoice
            .lines
            .iter()
            .map(|l| PurchaseLineResponse {
                sku: l.sku.clone(),
                quantity: l.quantity,
                unit_cost_cents: l.unit_cost.cents(),
            })
            .collect(),
        shipping_fee_cents: invoice.shipping_fee.cents(),
        transfer_fee_cents: invoice.transfer_fee.cents(),
        goods_total_cents: invoice.goods_total.cents(),
        total_cents: invoice.total.cents(),
        created_at: invoice.created_at.to_rfc3339(),
        deleted: invoice.deleted,
    }
}

// -- Handlers --

/// POST /purchases — run the purchase invoicing flow.
#[tracing::instrument(skip(state, req))]
pub async fn create<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseCreatedResponse>), ApiError> {
    let mut draft = PurchaseDraft::new(req.supplier)
        .with_shipping_fee(Money::from_cents(req.shipping_fee_cents))
        .with_transfer_fee(Money::from_cents(req.transfer_fee_cents));
    for line in req.lines {
        draft = draft.with_line(line.sku, line.quantity, Money::from_cents(line.unit_cost_cents));
    }

    let outcome = state.purchases.create_purchase(draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseCreatedResponse {
            flow_id: outcome.flow_id.to_string(),
            invoice: invoice_response(&outcome.invoice),
        }),
    ))
}

/// GET /purchases/:invoice_id — look up a purchase invoice.
#[tracing::instrument(skip(state))]
pub async fn get<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<PurchaseInvoiceResponse>, ApiError> {
    use saga::InvoiceService;

    let invoice = state
        .invoices
        .get_purchase(&invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Purchase invoice {invoice_id} not found")))?;

    Ok(Json(invoice_response(&invoice)))
}

/// DELETE /purchases/:invoice_id — fully reverse an invoiced purchase.
#[tracing::instrument(skip(state))]
pub async fn delete<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<PurchaseDeletedResponse>, ApiError> {
    let flow_id = state.purchases.delete_purchase(&invoice_id).await?;

    Ok(Json(PurchaseDeletedResponse {
        flow_id: flow_id.to_string(),
        invoice_id,
    }))
}
