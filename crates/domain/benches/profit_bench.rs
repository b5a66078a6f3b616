use chrono::Utc;
use common::{AggregateId, EmployeeId, OrderId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, CashAccount, LedgerService, Money, MovementDirection, OpenAccount, OrderFacts,
    OrderLine, OrderStatus, ProfitEngine, RecordMovement, ReferenceKind, SellerRole,
};
use journal::{AppendOptions, InMemoryJournal, Journal, JournalEntry, Version};

fn make_facts(line_count: usize) -> OrderFacts {
    OrderFacts {
        order_id: OrderId::new(),
        created_by: EmployeeId::new(),
        seller_role: SellerRole::Employee,
        lines: (0..line_count)
            .map(|i| {
                OrderLine::new(
                    Money::from_cents(1_500 + i as i64),
                    Money::from_cents(900 + i as i64),
                    2,
                )
            })
            .collect(),
        final_amount: Money::from_cents(100_000),
        delivery_fee: Money::from_cents(5_000),
        status: OrderStatus::Delivered,
        receipt_received: true,
        sold_at: Utc::now(),
    }
}

fn bench_profit_compute(c: &mut Criterion) {
    let engine = ProfitEngine::default();
    let facts = make_facts(5);

    c.bench_function("profit/compute_5_lines", |b| {
        b.iter(|| engine.compute(&facts));
    });

    let facts = make_facts(50);
    c.bench_function("profit/compute_50_lines", |b| {
        b.iter(|| engine.compute(&facts));
    });
}

fn bench_record_movement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = LedgerService::new(InMemoryJournal::new());
    let cmd = OpenAccount::new(
        AggregateId::new(),
        "Operating",
        true,
        Money::from_cents(1_000_000),
    );
    let account_id = cmd.account_id;
    rt.block_on(async { service.open_account(cmd).await.unwrap() });

    c.bench_function("ledger/record_movement", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .record_movement(RecordMovement::incoming(
                        account_id,
                        Money::from_cents(100),
                        ReferenceKind::Adjustment,
                        "bench",
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_balance_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();
    let account_id = AggregateId::new();

    // Pre-populate: 1 open + 100 movement events
    rt.block_on(async {
        let opened = domain::AccountEvent::account_opened(account_id, "Operating", true);
        let mut entries = vec![
            JournalEntry::builder()
                .aggregate_id(account_id)
                .aggregate_type("CashAccount")
                .entry_type("AccountOpened")
                .version(Version::new(1))
                .payload(&opened)
                .unwrap()
                .build(),
        ];
        for v in 2..=101 {
            let movement = domain::AccountEvent::movement_recorded(
                Money::from_cents(100 * v),
                MovementDirection::In,
                ReferenceKind::Adjustment,
                None,
                format!("Movement {v}"),
            );
            entries.push(
                JournalEntry::builder()
                    .aggregate_id(account_id)
                    .aggregate_type("CashAccount")
                    .entry_type("MovementRecorded")
                    .version(Version::new(v))
                    .payload(&movement)
                    .unwrap()
                    .build(),
            );
        }
        journal.append(entries, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("ledger/replay_100_movements", |b| {
        b.iter(|| {
            rt.block_on(async {
                let entries = journal.entries_for_aggregate(account_id).await.unwrap();
                let mut account = CashAccount::default();
                for entry in &entries {
                    let event: domain::AccountEvent =
                        serde_json::from_value(entry.payload.clone()).unwrap();
                    account.apply(event);
                }
                account.balance()
            });
        });
    });
}

criterion_group!(
    benches,
    bench_profit_compute,
    bench_record_movement,
    bench_balance_replay,
);
criterion_main!(benches);
