//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccountError, DomainError, ProfitError};
use journal::JournalError;
use saga::FlowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Caller is not allowed to touch the requested records.
    Forbidden(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Flow execution error.
    Flow(FlowError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(&err),
            ApiError::Flow(err) => flow_error_to_response(&err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: &DomainError) -> (StatusCode, String) {
    let status = match err {
        DomainError::Account(account_err) => match account_err {
            AccountError::InvalidAmount { .. } | AccountError::NameRequired => {
                StatusCode::BAD_REQUEST
            }
            AccountError::AlreadyOpened
            | AccountError::NotOpen
            | AccountError::Inactive
            | AccountError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        },
        DomainError::Profit(profit_err) => match profit_err {
            ProfitError::NotOwner { .. } => StatusCode::FORBIDDEN,
            ProfitError::NotFulfilled { .. } => StatusCode::BAD_REQUEST,
            ProfitError::NotRecorded => StatusCode::NOT_FOUND,
            ProfitError::AlreadyRecorded { .. }
            | ProfitError::AlreadySettled { .. }
            | ProfitError::NotSettled => StatusCode::CONFLICT,
        },
        DomainError::AggregateNotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Journal(JournalError::ConcurrencyConflict { .. }) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, err.to_string())
}

fn flow_error_to_response(err: &FlowError) -> (StatusCode, String) {
    let status = match err {
        FlowError::Domain(inner) => return domain_error_to_response(inner),
        FlowError::InvalidDraft(_)
        | FlowError::NothingToSettle
        | FlowError::DuplicateOrder(_) => StatusCode::BAD_REQUEST,
        FlowError::PurchaseNotFound(_)
        | FlowError::ProfitRecordMissing(_)
        | FlowError::FlowNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::NotOwner { .. } => StatusCode::FORBIDDEN,
        FlowError::PurchaseDeleted(_)
        | FlowError::AlreadySettled(_)
        | FlowError::InvalidState { .. } => StatusCode::CONFLICT,
        FlowError::Journal(JournalError::ConcurrencyConflict { .. }) => StatusCode::CONFLICT,
        FlowError::StockUpdate { .. } | FlowError::StepFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        ApiError::Flow(err)
    }
}
