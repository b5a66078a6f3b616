use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use journal::{
    AppendOptions, InMemoryJournal, JournalEntry, JournalExt, Version, store::Journal,
};

fn make_entry(aggregate_id: AggregateId, version: i64) -> JournalEntry {
    JournalEntry::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("CashAccount")
        .entry_type("MovementRecorded")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "MovementRecorded",
            "data": {
                "account_id": aggregate_id.to_string(),
                "amount": 1500,
                "direction": "In"
            }
        }))
        .build()
}

fn bench_append_single_entry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("journal/append_single_entry", |b| {
        b.iter(|| {
            rt.block_on(async {
                let journal = InMemoryJournal::new();
                let agg_id = AggregateId::new();
                let entry = make_entry(agg_id, 1);
                journal
                    .append(vec![entry], AppendOptions::new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("journal/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let journal = InMemoryJournal::new();
                let agg_id = AggregateId::new();
                let entries: Vec<JournalEntry> = (1..=10).map(|v| make_entry(agg_id, v)).collect();
                journal.append(entries, AppendOptions::new()).await.unwrap();
            });
        });
    });
}

fn bench_append_with_version_check(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("journal/append_with_version_check", |b| {
        b.iter(|| {
            rt.block_on(async {
                let journal = InMemoryJournal::new();
                let agg_id = AggregateId::new();
                let entry = make_entry(agg_id, 1);
                journal
                    .append(vec![entry], AppendOptions::expect_new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_entries_for_aggregate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();
    let agg_id = AggregateId::new();

    // Pre-populate with 100 entries
    rt.block_on(async {
        let entries: Vec<JournalEntry> = (1..=100).map(|v| make_entry(agg_id, v)).collect();
        journal.append(entries, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("journal/replay_100_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                journal.entries_for_aggregate(agg_id).await.unwrap();
            });
        });
    });
}

fn bench_stream_all_entries(c: &mut Criterion) {
    use futures_util::StreamExt;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let journal = InMemoryJournal::new();

    // Pre-populate with 1000 entries across 10 aggregates
    rt.block_on(async {
        for _ in 0..10 {
            let agg_id = AggregateId::new();
            let entries: Vec<JournalEntry> = (1..=100).map(|v| make_entry(agg_id, v)).collect();
            journal.append(entries, AppendOptions::new()).await.unwrap();
        }
    });

    c.bench_function("journal/stream_1000_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut stream = journal.stream_all_entries().await.unwrap();
                let mut count = 0;
                while let Some(result) = stream.next().await {
                    result.unwrap();
                    count += 1;
                }
                assert_eq!(count, 1000);
            });
        });
    });
}

fn bench_append_entry_ext(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("journal/append_single_via_ext", |b| {
        b.iter(|| {
            rt.block_on(async {
                let journal = InMemoryJournal::new();
                let agg_id = AggregateId::new();
                let entry = make_entry(agg_id, 1);
                journal
                    .append_entry(entry, AppendOptions::new())
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_entry,
    bench_append_batch_10,
    bench_append_with_version_check,
    bench_entries_for_aggregate,
    bench_stream_all_entries,
    bench_append_entry_ext,
);
criterion_main!(benches);
