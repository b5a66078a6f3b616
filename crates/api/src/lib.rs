//! HTTP API server for the cash ledger and profit settlement system.
//!
//! Provides REST endpoints for cash accounts, purchases, profit records,
//! settlements and financial reports, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use common::AggregateId;
use domain::{DomainError, LedgerService, Money, OpenAccount, ProfitService};
use journal::Journal;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    AccountBalancesView, FinancialSummaryView, ProfitRecordsView, Projection, ProjectionProcessor,
};
use saga::{
    InMemoryExpenseService, InMemoryInvoiceService, InMemoryStockService, PurchaseCoordinator,
    SettlementCoordinator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<J: Journal + Clone + 'static>(
    state: Arc<AppState<J>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/accounts", post(routes::accounts::create::<J>))
        .route("/accounts", get(routes::accounts::list::<J>))
        .route("/accounts/{id}", get(routes::accounts::get::<J>))
        .route(
            "/accounts/{id}/movements",
            post(routes::accounts::record_movement::<J>),
        )
        .route(
            "/accounts/{id}/movements",
            get(routes::accounts::movements::<J>),
        )
        .route("/purchases", post(routes::purchases::create::<J>))
        .route("/purchases/{invoice_id}", get(routes::purchases::get::<J>))
        .route(
            "/purchases/{invoice_id}",
            delete(routes::purchases::delete::<J>),
        )
        .route("/profits", post(routes::profits::record::<J>))
        .route("/profits/pending", get(routes::profits::pending::<J>))
        .route("/profits/{order_id}", get(routes::profits::get::<J>))
        .route("/settlements", post(routes::settlements::create::<J>))
        .route("/settlements", get(routes::settlements::list::<J>))
        .route("/reports/summary", get(routes::reports::summary::<J>))
        .route(
            "/reports/summary/refresh",
            post(routes::reports::refresh::<J>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over a journal.
///
/// Opens the operating cash account that purchases and settlements pay out
/// of, wires the coordinators to the in-memory stock, expense and invoice
/// services, and registers the three read model views.
pub async fn create_default_state<J: Journal + Clone + 'static>(
    journal: J,
) -> Result<(Arc<AppState<J>>, Arc<ProjectionProcessor<J>>), DomainError> {
    let ledger = LedgerService::new(journal.clone());
    let profits = ProfitService::new(journal.clone());

    let stock = InMemoryStockService::new();
    let expenses = InMemoryExpenseService::new();
    let invoices = InMemoryInvoiceService::new();

    let operating_account = AggregateId::new();
    ledger
        .open_account(OpenAccount::new(
            operating_account,
            "Operating",
            false,
            Money::zero(),
        ))
        .await?;

    let purchases = PurchaseCoordinator::new(
        journal.clone(),
        operating_account,
        stock.clone(),
        expenses.clone(),
        invoices.clone(),
    );
    let settlements = SettlementCoordinator::new(
        journal.clone(),
        operating_account,
        expenses.clone(),
        invoices.clone(),
    );

    let balances = AccountBalancesView::new();
    let records = ProfitRecordsView::new();
    let summaries = FinancialSummaryView::new();

    let mut processor = ProjectionProcessor::new(journal);
    processor.register(Box::new(balances.clone()) as Box<dyn Projection>);
    processor.register(Box::new(records.clone()) as Box<dyn Projection>);
    processor.register(Box::new(summaries.clone()) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    let state = Arc::new(AppState {
        ledger,
        profits,
        purchases,
        settlements,
        operating_account,
        stock,
        expenses,
        invoices,
        balances,
        records,
        summaries,
        processor: processor.clone(),
    });

    Ok((state, processor))
}
