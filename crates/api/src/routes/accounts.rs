//! Cash account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{
    AccountEvent, CashAccount, Money, MovementDirection, OpenAccount, RecordMovement,
    ReferenceKind,
};
use journal::Journal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::{AppState, parse_aggregate_id};

// -- Request types --

#[derive(Deserialize)]
pub struct OpenAccountRequest {
    pub name: String,
    #[serde(default)]
    pub allow_overdraft: bool,
    #[serde(default)]
    pub initial_balance_cents: i64,
}

#[derive(Deserialize)]
pub struct MovementRequest {
    pub amount_cents: i64,
    pub direction: String,
    pub reference: String,
    pub reference_id: Option<String>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub name: String,
    pub allow_overdraft: bool,
    pub is_active: bool,
    pub balance_cents: i64,
    pub movement_count: usize,
}

#[derive(Serialize)]
pub struct MovementRecordedResponse {
    pub account_id: String,
    pub movement_id: Option<String>,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct MovementResponse {
    pub movement_id: String,
    pub amount_cents: i64,
    pub direction: String,
    pub reference: String,
    pub reference_id: Option<String>,
    pub description: String,
    pub recorded_at: String,
}

fn account_response(account_id: AggregateId, account: &CashAccount) -> AccountResponse {
    AccountResponse {
        account_id: account_id.to_string(),
        name: account.name().to_string(),
        allow_overdraft: account.allow_overdraft(),
        is_active: account.is_active(),
        balance_cents: account.balance().cents(),
        movement_count: account.movement_count(),
    }
}

fn parse_direction(raw: &str) -> Result<MovementDirection, ApiError> {
    match raw {
        "in" => Ok(MovementDirection::In),
        "out" => Ok(MovementDirection::Out),
        other => Err(ApiError::BadRequest(format!(
            "Invalid direction '{other}' (expected 'in' or 'out')"
        ))),
    }
}

fn parse_reference(raw: &str) -> Result<ReferenceKind, ApiError> {
    match raw {
        "opening_balance" => Ok(ReferenceKind::OpeningBalance),
        "capital_injection" => Ok(ReferenceKind::CapitalInjection),
        "capital_withdrawal" => Ok(ReferenceKind::CapitalWithdrawal),
        "purchase" => Ok(ReferenceKind::Purchase),
        "purchase_reversal" => Ok(ReferenceKind::PurchaseReversal),
        "settlement" => Ok(ReferenceKind::Settlement),
        "settlement_reversal" => Ok(ReferenceKind::SettlementReversal),
        "adjustment" => Ok(ReferenceKind::Adjustment),
        other => Err(ApiError::BadRequest(format!(
            "Invalid reference kind '{other}'"
        ))),
    }
}

// -- Handlers --

/// POST /accounts — open a cash account.
#[tracing::instrument(skip(state, req))]
pub async fn create<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Json(req): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let cmd = OpenAccount::new(
        AggregateId::new(),
        req.name,
        req.allow_overdraft,
        Money::from_cents(req.initial_balance_cents),
    );
    let account_id = cmd.account_id;

    let result = state.ledger.open_account(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(account_response(account_id, &result.aggregate)),
    ))
}

/// GET /accounts — list accounts from the balances read model.
#[tracing::instrument(skip(state))]
pub async fn list<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    state
        .processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let accounts = state.balances.get_all_accounts().await;

    let responses: Vec<AccountResponse> = accounts
        .into_iter()
        .map(|a| AccountResponse {
            account_id: a.account_id.to_string(),
            name: a.name,
            allow_overdraft: a.allow_overdraft,
            is_active: a.is_active,
            balance_cents: a.balance.cents(),
            movement_count: a.movement_count as usize,
        })
        .collect();

    Ok(Json(responses))
}

/// GET /accounts/:id — load an account by replaying its journal entries.
#[tracing::instrument(skip(state))]
pub async fn get<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;

    let account = state
        .ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Account {id} not found")))?;

    Ok(Json(account_response(account_id, &account)))
}

/// POST /accounts/:id/movements — record a cash movement.
#[tracing::instrument(skip(state, req))]
pub async fn record_movement<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
    Json(req): Json<MovementRequest>,
) -> Result<(StatusCode, Json<MovementRecordedResponse>), ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    let direction = parse_direction(&req.direction)?;
    let reference = parse_reference(&req.reference)?;

    let cmd = RecordMovement::new(
        account_id,
        Money::from_cents(req.amount_cents),
        direction,
        reference,
        req.reference_id,
        req.description,
    );

    let result = state.ledger.record_movement(cmd).await?;

    let movement_id = result.events.iter().find_map(|event| match event {
        AccountEvent::MovementRecorded(data) => Some(data.movement_id.to_string()),
        _ => None,
    });

    Ok((
        StatusCode::CREATED,
        Json(MovementRecordedResponse {
            account_id: account_id.to_string(),
            movement_id,
            balance_cents: result.aggregate.balance().cents(),
        }),
    ))
}

/// GET /accounts/:id/movements — list movements, newest first.
#[tracing::instrument(skip(state))]
pub async fn movements<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Path(id): Path<String>,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<Vec<MovementResponse>>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;

    let movements = state.ledger.list_movements(account_id, query.limit).await?;

    let responses: Vec<MovementResponse> = movements
        .into_iter()
        .map(|m| MovementResponse {
            movement_id: m.movement_id.to_string(),
            amount_cents: m.amount.cents(),
            direction: m.direction.to_string(),
            reference: m.reference.to_string(),
            reference_id: m.reference_id,
            description: m.description,
            recorded_at: m.recorded_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(responses))
}
