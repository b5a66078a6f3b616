//! Financial summary endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use journal::Journal;
use projections::{FinancialSummary, Period};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::AppState;

// -- Request types --

fn default_period() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_period")]
    pub period: String,
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub week: Option<u32>,
    pub month: Option<u32>,
}

impl SummaryQuery {
    fn to_period(&self) -> Result<Period, ApiError> {
        match self.period.as_str() {
            "all" => Ok(Period::All),
            "day" => self
                .date
                .map(Period::Day)
                .ok_or_else(|| ApiError::BadRequest("period=day requires 'date'".to_string())),
            "week" => match (self.year, self.week) {
                (Some(year), Some(week)) => Ok(Period::Week { year, week }),
                _ => Err(ApiError::BadRequest(
                    "period=week requires 'year' and 'week'".to_string(),
                )),
            },
            "month" => match (self.year, self.month) {
                (Some(year), Some(month)) => Ok(Period::Month { year, month }),
                _ => Err(ApiError::BadRequest(
                    "period=month requires 'year' and 'month'".to_string(),
                )),
            },
            "year" => self
                .year
                .map(Period::Year)
                .ok_or_else(|| ApiError::BadRequest("period=year requires 'year'".to_string())),
            other => Err(ApiError::BadRequest(format!("Unknown period '{other}'"))),
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct SummaryResponse {
    pub period: String,
    pub summary: FinancialSummary,
}

// -- Handlers --

/// GET /reports/summary — period financial summary, cached.
#[tracing::instrument(skip(state))]
pub async fn summary<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period = query.to_period()?;

    state
        .processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let summary = state.summaries.summarize(period).await;

    Ok(Json(SummaryResponse {
        period: period.to_string(),
        summary,
    }))
}

/// POST /reports/summary/refresh — force recomputation, bypassing the cache.
#[tracing::instrument(skip(state))]
pub async fn refresh<J: Journal + Clone + 'static>(
    State(state): State<Arc<AppState<J>>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period = query.to_period()?;

    state
        .processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let summary = state.summaries.refresh(period).await;

    Ok(Json(SummaryResponse {
        period: period.to_string(),
        summary,
    }))
}
