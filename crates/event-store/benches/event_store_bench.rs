use common::{AggregateId, AggregateType, Tenant, new_object_id};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    EventEnvelope, EventStore, EventStoreExt, ExpectedVersion, InMemoryEventStore, Version,
};

const CONTRACT: AggregateType = AggregateType::from_static("contract");

fn new_stream() -> AggregateId {
    AggregateId::new(&CONTRACT, &Tenant::new("bench"), &new_object_id())
}

fn make_event(aggregate_id: &AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id.clone())
        .aggregate_type(CONTRACT)
        .event_type("ContractUpdateV1")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "name": "Annual subscription",
            "lengthInMonths": 12,
            "fieldsMask": ["name"]
        }))
        .build()
        .unwrap()
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = new_stream();
                store
                    .append_to_stream(&id, ExpectedVersion::NoStream, vec![make_event(&id, 0)])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = new_stream();
                let events: Vec<EventEnvelope> = (0..10).map(|v| make_event(&id, v)).collect();
                store
                    .append_to_stream(&id, ExpectedVersion::NoStream, events)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_read_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let id = new_stream();

    rt.block_on(async {
        let events: Vec<EventEnvelope> = (0..100).map(|v| make_event(&id, v)).collect();
        store
            .append_to_stream(&id, ExpectedVersion::NoStream, events)
            .await
            .unwrap();
    });

    c.bench_function("event_store/read_stream_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read_stream(&id).await.unwrap();
            });
        });
    });
}

fn bench_stream_all_events(c: &mut Criterion) {
    use futures_util::StreamExt;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    // 1000 events across 10 streams
    rt.block_on(async {
        for _ in 0..10 {
            let id = new_stream();
            let events: Vec<EventEnvelope> = (0..100).map(|v| make_event(&id, v)).collect();
            store
                .append_to_stream(&id, ExpectedVersion::Any, events)
                .await
                .unwrap();
        }
    });

    c.bench_function("event_store/stream_1000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut stream = store.stream_all_events().await.unwrap();
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

fn bench_append_event_ext(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_via_ext", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = new_stream();
                store
                    .append_event(make_event(&id, 0), ExpectedVersion::Any)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_append_batch_10,
    bench_read_stream,
    bench_stream_all_events,
    bench_append_event_ext,
);
criterion_main!(benches);
