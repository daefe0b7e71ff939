//! End-to-end bus behaviour over the in-memory broker

use bus::{
    BusError, EventBus, EventPublisher, EventPublisherExt, IdempotencyStore, InMemoryBroker,
    InMemoryIdempotencyStore, MessageBroker,
};
use common::{Event, Notification};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use rstest::*;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    FailingIdempotencyStore, RecordingHandler, StoreFailure, init_test_logging, wait_for, with_timeout,
};

struct Harness {
    broker: Arc<InMemoryBroker>,
    store: Arc<InMemoryIdempotencyStore>,
    bus: EventBus,
}

#[fixture]
async fn harness() -> Harness {
    init_test_logging();
    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(InMemoryIdempotencyStore::new());
    let bus = EventBus::new(
        Arc::clone(&broker) as Arc<dyn MessageBroker>,
        Arc::clone(&store) as Arc<dyn IdempotencyStore>,
    );
    bus.open().await.unwrap();
    Harness { broker, store, bus }
}

async fn eventually(condition: impl Fn() -> bool) {
    wait_for(
        || {
            let met = condition();
            async move { met }
        },
        Duration::from_secs(5),
        Duration::from_millis(5),
    )
    .await
    .unwrap();
}

#[rstest]
#[tokio::test]
async fn test_publish_routes_to_type_queue(#[future] harness: Harness) {
    let Harness { broker, store, bus } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    let event = Event::new(Notification::new("X"));
    bus.publish(&event).await.unwrap();

    eventually(|| broker.stats().acked == 1).await;
    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].routing_key, "Notification");
    assert_eq!(broker.enqueued("Notification_queue"), 1);
    assert_eq!(broker.queue_names(), vec!["Notification_queue".to_string()]);

    let payloads = handler.payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["text"], "X");
    assert_eq!(payloads[0]["event_id"], event.event_id());
    assert!(store.is_processed(event.event_id()).await.unwrap());

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_redelivered_event_id_is_acked_without_handling(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    let event = Event::new(Notification::new("once"));
    bus.publish(&event).await.unwrap();
    bus.publish(&event).await.unwrap();

    eventually(|| broker.stats().acked == 2).await;
    assert_eq!(handler.calls(), 1);
    assert_eq!(broker.stats().rejected, 0);

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_unusable_messages_are_rejected_without_requeue(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    broker
        .inject("Notification_queue", "Notification", b"{not json".to_vec())
        .unwrap();
    broker
        .inject("Notification_queue", "Notification", br#"{"text":"no id"}"#.to_vec())
        .unwrap();

    eventually(|| broker.stats().rejected == 2).await;
    assert_eq!(handler.calls(), 0);
    assert_eq!(broker.stats().requeued, 0);

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_failed_handler_gets_redelivery(#[future] harness: Harness) {
    let Harness { broker, store, bus } = harness.await;
    let handler = Arc::new(RecordingHandler::failing("Notification", 1));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    let event = Event::new(Notification::new("retry me"));
    bus.publish(&event).await.unwrap();

    eventually(|| broker.stats().acked == 1).await;
    let stats = broker.stats();
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.rejected, 0);
    assert_eq!(handler.calls(), 2);
    assert_eq!(handler.payloads().await.len(), 1);
    assert!(store.is_processed(event.event_id()).await.unwrap());

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_subscriptions_only_see_their_type(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let notifications = Arc::new(RecordingHandler::new("Notification"));
    let updates = Arc::new(RecordingHandler::new("UpdateFinancialInstruments"));
    bus.subscribe("Notification", notifications.clone()).await.unwrap();
    bus.subscribe("UpdateFinancialInstruments", updates.clone())
        .await
        .unwrap();
    assert_eq!(bus.subscription_count(), 2);

    bus.publish(&Event::new(Notification::new("a"))).await.unwrap();
    bus.publish(&Event::new(Notification::new("b"))).await.unwrap();

    eventually(|| broker.stats().acked == 2).await;
    assert_eq!(notifications.calls(), 2);
    assert_eq!(updates.calls(), 0);
    assert_eq!(broker.enqueued("UpdateFinancialInstruments_queue"), 0);

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_publisher_port_encodes_events(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let publisher: &dyn EventPublisher = &bus;

    let event = Event::new(Notification::new("via port"));
    publisher.publish_event(&event).await.unwrap();

    let published = broker.published();
    assert_eq!(published.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&published[0].body).unwrap();
    assert_eq!(body["event_type"], "Notification");
    assert_eq!(body["text"], "via port");

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_close_is_idempotent_and_final(#[future] harness: Harness) {
    let Harness { bus, .. } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler).await.unwrap();

    bus.close().await.unwrap();
    bus.close().await.unwrap();

    assert!(bus.is_closed());
    assert!(bus.shutdown_token().is_cancelled());
    assert_eq!(bus.subscription_count(), 0);

    let err = bus
        .publish(&Event::new(Notification::new("late")))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Closed));

    let handler = Arc::new(RecordingHandler::new("Notification"));
    let err = bus.subscribe("Notification", handler).await.unwrap_err();
    assert!(matches!(err, BusError::Closed));
}

#[tokio::test]
async fn test_open_fails_when_store_is_unreachable() {
    init_test_logging();
    let bus = EventBus::new(
        Arc::new(InMemoryBroker::new()),
        Arc::new(FailingIdempotencyStore::new(StoreFailure::Initialize)),
    );

    let err = bus.open().await.unwrap_err();
    assert!(matches!(err, BusError::Store(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_failure_requeues_instead_of_dropping() {
    init_test_logging();
    let broker = Arc::new(InMemoryBroker::new());
    let bus = EventBus::new(
        Arc::clone(&broker) as Arc<dyn MessageBroker>,
        Arc::new(FailingIdempotencyStore::new(StoreFailure::Read)),
    );
    bus.open().await.unwrap();
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    bus.publish(&Event::new(Notification::new("unknown state")))
        .await
        .unwrap();

    eventually(|| broker.stats().requeued >= 1).await;
    bus.close().await.unwrap();

    let stats = broker.stats();
    assert_eq!(stats.acked, 0);
    assert_eq!(stats.rejected, 0);
    assert_eq!(handler.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn test_subscription_survives_dropped_connection(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    bus.publish(&Event::new(Notification::new("before"))).await.unwrap();
    eventually(|| broker.stats().acked == 1).await;

    broker.drop_connection();
    eventually(|| broker.consume_count() == 2).await;

    bus.publish(&Event::new(Notification::new("after"))).await.unwrap();
    eventually(|| broker.stats().acked == 2).await;

    let texts: Vec<_> = handler
        .payloads()
        .await
        .into_iter()
        .map(|payload| payload["text"].clone())
        .collect();
    assert_eq!(texts, vec!["before", "after"]);
    assert_eq!(bus.subscription_count(), 1);

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_backlog_published_while_disconnected_is_handled(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    let handler = Arc::new(RecordingHandler::new("Notification"));
    bus.subscribe("Notification", handler.clone()).await.unwrap();

    broker.drop_connection();
    bus.publish(&Event::new(Notification::new("queued"))).await.unwrap();

    eventually(|| broker.stats().acked == 1).await;
    assert_eq!(handler.calls(), 1);

    bus.close().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_close_stops_resubscribing(#[future] harness: Harness) {
    let Harness { broker, bus, .. } = harness.await;
    bus.subscribe("Notification", Arc::new(RecordingHandler::new("Notification")))
        .await
        .unwrap();

    broker.drop_connection();
    with_timeout(Duration::from_secs(5), bus.close())
        .await
        .unwrap()
        .unwrap();
    let consumed = broker.consume_count();

    broker.drop_connection();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.consume_count(), consumed);
}

#[tokio::test]
async fn test_requeued_delivery_is_flagged_redelivered() {
    let broker = InMemoryBroker::new();
    let mut deliveries = broker.consume("Notification_queue", "Notification").await.unwrap();
    broker.publish("Notification", b"{}".to_vec()).await.unwrap();

    let first = deliveries.next().await.unwrap().unwrap();
    assert!(!first.redelivered());
    first.reject(true).await.unwrap();

    let second = deliveries.next().await.unwrap().unwrap();
    assert!(second.redelivered());
    assert_eq!(second.routing_key(), "Notification");
    second.ack().await.unwrap();
    assert_eq!(broker.stats().requeued, 1);
    assert_eq!(broker.stats().acked, 1);
}
