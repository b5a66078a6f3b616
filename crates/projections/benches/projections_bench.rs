use chrono::Utc;
use common::{AggregateId, EmployeeId, OrderId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::profit::profit_stream_id;
use domain::{DomainEvent, Money, ProfitBreakdown, ProfitEvent, SellerRole};
use journal::{AppendOptions, InMemoryJournal, Journal, JournalEntry, Version};
use projections::{FinancialSummaryView, Period, Projection, ProjectionProcessor};

use std::sync::Arc;

fn make_entry(stream_id: AggregateId, version: i64, event: &ProfitEvent) -> JournalEntry {
    JournalEntry::builder()
        .aggregate_id(stream_id)
        .aggregate_type("ProfitRecord")
        .entry_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
}

fn breakdown() -> ProfitBreakdown {
    ProfitBreakdown {
        total_cost: Money::from_cents(27_000),
        revenue_excl_delivery: Money::from_cents(45_000),
        total_profit: Money::from_cents(18_000),
        employee_profit: Money::from_cents(5_400),
        system_profit: Money::from_cents(12_600),
    }
}

/// Populate a journal with N orders, each recorded and then settled.
async fn populate_journal(journal: &InMemoryJournal, n: usize) {
    for _ in 0..n {
        let order_id = OrderId::new();
        let stream_id = profit_stream_id(order_id);

        let recorded = ProfitEvent::profit_recorded(
            order_id,
            EmployeeId::new(),
            SellerRole::Employee,
            Money::from_cents(5_000),
            breakdown(),
            Utc::now(),
        );
        let settled =
            ProfitEvent::profit_settled(AggregateId::new(), Utc::now(), Money::from_cents(5_400));

        let entries = vec![
            make_entry(stream_id, 1, &recorded),
            make_entry(stream_id, 2, &settled),
        ];
        journal.append(entries, AppendOptions::new()).await.unwrap();
    }
}

fn bench_catch_up_100_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();

    rt.block_on(populate_journal(&journal, 100));

    c.bench_function("projections/catch_up_200_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = FinancialSummaryView::new();
                let mut processor = ProjectionProcessor::new(journal.clone());
                processor.register(Box::new(view.clone()) as Box<dyn Projection>);
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_catch_up_1000_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();

    rt.block_on(populate_journal(&journal, 1000));

    c.bench_function("projections/catch_up_2000_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = FinancialSummaryView::new();
                let mut processor = ProjectionProcessor::new(journal.clone());
                processor.register(Box::new(view.clone()) as Box<dyn Projection>);
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_process_single_entry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let view = Arc::new(FinancialSummaryView::new());

    c.bench_function("projections/process_single_entry", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order_id = OrderId::new();
                let event = ProfitEvent::profit_recorded(
                    order_id,
                    EmployeeId::new(),
                    SellerRole::Employee,
                    Money::from_cents(5_000),
                    breakdown(),
                    Utc::now(),
                );
                let entry = make_entry(profit_stream_id(order_id), 1, &event);
                view.handle(&entry).await.unwrap();
            });
        });
    });
}

fn bench_summarize_cached(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();
    let view = Arc::new(FinancialSummaryView::new());

    rt.block_on(async {
        populate_journal(&journal, 100).await;
        let mut processor = ProjectionProcessor::new(journal);
        processor.register(Box::new(view.as_ref().clone()) as Box<dyn Projection>);
        processor.run_catch_up().await.unwrap();
        // Warm the cache
        view.summarize(Period::All).await;
    });

    c.bench_function("projections/summarize_cached", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.summarize(Period::All).await;
            });
        });
    });
}

fn bench_refresh_100_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();
    let view = Arc::new(FinancialSummaryView::new());

    rt.block_on(async {
        populate_journal(&journal, 100).await;
        let mut processor = ProjectionProcessor::new(journal);
        processor.register(Box::new(view.as_ref().clone()) as Box<dyn Projection>);
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/refresh_100_orders", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.refresh(Period::All).await;
            });
        });
    });
}

fn bench_rebuild_100_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();
    let view = Arc::new(FinancialSummaryView::new());

    rt.block_on(async {
        populate_journal(&journal, 100).await;
    });

    let mut processor = ProjectionProcessor::new(journal);
    processor.register(Box::new(view.as_ref().clone()) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    c.bench_function("projections/rebuild_200_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                processor.rebuild_all().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_catch_up_100_orders,
    bench_catch_up_1000_orders,
    bench_process_single_entry,
    bench_summarize_cached,
    bench_refresh_100_orders,
    bench_rebuild_100_orders,
);
criterion_main!(benches);
