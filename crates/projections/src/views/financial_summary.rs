//! Financial summary read model — period aggregates over profit records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use common::AggregateId;
use domain::{Money, ProfitEvent, SellerRole};
use journal::JournalEntry;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// A reporting period. All bounds are half-open `[start, end)` in UTC.
///
/// Weeks follow ISO 8601: they start on Monday and week 1 is the week
/// containing the year's first Thursday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Year(i32),
    All,
}

impl Period {
    /// Returns the `[start, end)` bounds of this period.
    ///
    /// Returns `None` for `All` and for calendar components that don't
    /// exist (week 60, month 13).
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let day_start = |date: NaiveDate| date.and_time(NaiveTime::MIN).and_utc();

        match *self {
            Period::Day(date) => {
                let start = day_start(date);
                Some((start, start + Duration::days(1)))
            }
            Period::Week { year, week } => {
                let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
                let start = day_start(monday);
                Some((start, start + Duration::days(7)))
            }
            Period::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some((day_start(first), day_start(next)))
            }
            Period::Year(year) => {
                let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
                Some((day_start(first), day_start(next)))
            }
            Period::All => None,
        }
    }

    /// Whether a timestamp falls inside this period.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        match self {
            Period::All => true,
            _ => self
                .bounds()
                .is_some_and(|(start, end)| start <= ts && ts < end),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Period::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Period::Week { year, week } => write!(f, "{}-W{:02}", year, week),
            Period::Month { year, month } => write!(f, "{}-{:02}", year, month),
            Period::Year(year) => write!(f, "{}", year),
            Period::All => write!(f, "all"),
        }
    }
}

/// Aggregated financial figures for one period.
///
/// Sales figures are bucketed by the sale timestamp; employee dues are
/// bucketed by the settlement timestamp. The two can land in different
/// periods for the same order.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    /// Revenue including delivery fees.
    pub total_revenue: Money,

    /// Delivery fees collected.
    pub delivery_fees: Money,

    /// Cost of goods sold.
    pub cogs: Money,

    /// `total_revenue - delivery_fees - cogs`. Never clamped at zero.
    pub gross_profit: Money,

    /// Employee shares paid out in this period.
    pub employee_dues_paid: Money,

    /// `gross_profit - employee_dues_paid`.
    pub net_profit: Money,

    /// Revenue (excluding delivery fees) from manager sales.
    pub manager_sales: Money,

    /// Revenue (excluding delivery fees) from employee sales.
    pub employee_sales: Money,

    /// Number of sales in this period.
    pub order_count: u64,

    /// When this summary was computed.
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SaleFacts {
    seller_role: SellerRole,
    revenue: Money,
    delivery_fee: Money,
    total_cost: Money,
    sold_at: DateTime<Utc>,
    settlement: Option<(DateTime<Utc>, Money)>,
}

#[derive(Default)]
struct SummaryState {
    sales: HashMap<AggregateId, SaleFacts>,
    cache: HashMap<Period, FinancialSummary>,
}

/// Read model view computing cached per-period financial summaries.
///
/// Summaries are computed lazily on first request and cached until a new
/// profit entry arrives, which drops the whole cache. `refresh` recomputes
/// regardless of cache state.
#[derive(Clone)]
pub struct FinancialSummaryView {
    state: Arc<RwLock<SummaryState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl FinancialSummaryView {
    /// Creates a new empty summary view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SummaryState::default())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Returns the summary for a period, computing and caching it if needed.
    pub async fn summarize(&self, period: Period) -> FinancialSummary {
        if let Some(cached) = self.state.read().await.cache.get(&period) {
            return cached.clone();
        }
        self.refresh(period).await
    }

    /// Recomputes the summary for a period, replacing any cached value.
    pub async fn refresh(&self, period: Period) -> FinancialSummary {
        let mut state = self.state.write().await;
        let summary = Self::compute(&state.sales, period);
        state.cache.insert(period, summary.clone());
        summary
    }

    fn compute(sales: &HashMap<AggregateId, SaleFacts>, period: Period) -> FinancialSummary {
        let mut total_revenue = Money::zero();
        let mut delivery_fees = Money::zero();
        let mut cogs = Money::zero();
        let mut manager_sales = Money::zero();
        let mut employee_sales = Money::zero();
        let mut employee_dues_paid = Money::zero();
        let mut order_count = 0u64;

        for sale in sales.values() {
            if period.contains(sale.sold_at) {
                total_revenue += sale.revenue + sale.delivery_fee;
                delivery_fees += sale.delivery_fee;
                cogs += sale.total_cost;
                match sale.seller_role {
                    SellerRole::Manager => manager_sales += sale.revenue,
                    SellerRole::Employee => employee_sales += sale.revenue,
                }
                order_count += 1;
            }

            if let Some((settled_at, amount)) = sale.settlement {
                if period.contains(settled_at) {
                    employee_dues_paid += amount;
                }
            }
        }

        let gross_profit = total_revenue - delivery_fees - cogs;
        let net_profit = gross_profit - employee_dues_paid;

        FinancialSummary {
            total_revenue,
            delivery_fees,
            cogs,
            gross_profit,
            employee_dues_paid,
            net_profit,
            manager_sales,
            employee_sales,
            order_count,
            computed_at: Utc::now(),
        }
    }
}

impl Default for FinancialSummaryView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for FinancialSummaryView {
    fn name(&self) -> &'static str {
        "FinancialSummaryView"
    }

    async fn handle(&self, entry: &JournalEntry) -> Result<()> {
        if entry.aggregate_type != "ProfitRecord" {
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            return Ok(());
        }

        let profit_event: ProfitEvent = serde_json::from_value(entry.payload.clone())?;
        let stream_id = entry.aggregate_id;

        let mut state = self.state.write().await;

        match profit_event {
            ProfitEvent::ProfitRecorded(data) => {
                state.sales.insert(
                    stream_id,
                    SaleFacts {
                        seller_role: data.seller_role,
                        revenue: data.revenue,
                        delivery_fee: data.delivery_fee,
                        total_cost: data.total_cost,
                        sold_at: data.sold_at,
                        settlement: None,
                    },
                );
            }
            ProfitEvent::ProfitSettled(data) => {
                if let Some(sale) = state.sales.get_mut(&stream_id) {
                    sale.settlement = Some((data.settled_at, data.amount));
                }
            }
            ProfitEvent::SettlementReverted(_) => {
                if let Some(sale) = state.sales.get_mut(&stream_id) {
                    sale.settlement = None;
                }
            }
        }

        // Any profit entry can shift any period's figures
        state.cache.clear();

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.sales.clear();
        state.cache.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for FinancialSummaryView {
    fn name(&self) -> &'static str {
        "FinancialSummaryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.sales.len()).unwrap_or(0)
    }
}
