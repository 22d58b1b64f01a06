use common::{Actor, AggregateId, ExternalOrderRef};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use domain::{
    Aggregate, BundleComponent, CommandContext, FulfillmentEvent, FulfillmentOrder,
    FulfillmentService, FulfillmentState, IngestOrder, calculate_possible_quantity,
};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &FulfillmentEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("FulfillmentOrder")
        .event_type(domain::DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn bench_bundle_quantity(c: &mut Criterion) {
    let components: Vec<_> = (1..=50)
        .map(|i| BundleComponent::new(i % 4 + 1, 1_000 - i * 7))
        .collect();

    c.bench_function("domain/bundle_possible_quantity_50", |b| {
        b.iter(|| calculate_possible_quantity(black_box(&components)));
    });
}

fn bench_path_to(c: &mut Criterion) {
    c.bench_function("domain/path_pending_to_delivered", |b| {
        b.iter(|| black_box(FulfillmentState::Pending).path_to(FulfillmentState::Delivered));
    });
}

fn bench_ingest_and_walk(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let context = CommandContext::new(Actor::system("bench"));
    let mut n = 0u64;

    c.bench_function("domain/ingest_and_reconcile_to_delivered", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                let service = FulfillmentService::new(InMemoryEventStore::new());
                let ingested = service
                    .ingest_order(IngestOrder::new(
                        format!("#{n}"),
                        "bench",
                        Actor::system("bench"),
                    ))
                    .await
                    .unwrap();
                let id = ingested.order.id().unwrap();
                service
                    .reconcile_to(id, FulfillmentState::Delivered, None, &context)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconstruction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let agg_id = AggregateId::new();

    // 1 ingest + 100 alternating hold/release events
    rt.block_on(async {
        let created =
            FulfillmentEvent::order_ingested(agg_id, ExternalOrderRef::new("#bench"), "bench");
        let mut events = vec![make_envelope(agg_id, 1, &created)];
        for v in 2..=101 {
            let event = if v % 2 == 0 {
                FulfillmentEvent::order_held("bench", FulfillmentState::Pending)
            } else {
                FulfillmentEvent::hold_released("bench", FulfillmentState::Pending)
            };
            events.push(make_envelope(agg_id, v, &event));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/reconstruct_101_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(agg_id).await.unwrap();
                let mut order = FulfillmentOrder::default();
                for event in &events {
                    let domain_event: FulfillmentEvent =
                        serde_json::from_value(event.payload.clone()).unwrap();
                    order.apply(domain_event);
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_bundle_quantity,
    bench_path_to,
    bench_ingest_and_walk,
    bench_reconstruction,
);
criterion_main!(benches);
