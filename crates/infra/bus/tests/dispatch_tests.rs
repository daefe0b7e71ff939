//! Delivery state machine without a broker

use bus::{BusError, Disposition, IdempotencyStore, InMemoryIdempotencyStore, Outcome, process_message};
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;
use test_utils::{FailingIdempotencyStore, RecordingHandler, StoreFailure, init_test_logging};

#[fixture]
fn store() -> InMemoryIdempotencyStore {
    init_test_logging();
    InMemoryIdempotencyStore::new()
}

fn message(event_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event_id": event_id,
        "event_type": "Notification",
        "occurred_on": "2025-01-06T00:00:00+00:00",
        "text": "hello"
    }))
    .unwrap()
}

#[rstest]
#[tokio::test]
async fn test_novel_event_is_handled_and_marked(store: InMemoryIdempotencyStore) {
    let handler = RecordingHandler::new("Notification");

    let outcome = process_message(&message("e-1"), &store, &handler).await.unwrap();

    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert!(store.is_processed("e-1").await.unwrap());
    let payloads = handler.payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["text"], "hello");
}

#[rstest]
#[tokio::test]
async fn test_processed_event_skips_handler(store: InMemoryIdempotencyStore) {
    let handler = RecordingHandler::new("Notification");
    store.mark_as_processed("e-1").await.unwrap();

    let outcome = process_message(&message("e-1"), &store, &handler).await.unwrap();

    assert_eq!(outcome, Outcome::Duplicate);
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert_eq!(handler.calls(), 0);
}

#[rstest]
#[case::not_json(b"not json".to_vec(), Outcome::Poison)]
#[case::truncated(b"{\"event_id\":".to_vec(), Outcome::Poison)]
#[case::no_id(br#"{"text":"hello"}"#.to_vec(), Outcome::MissingId)]
#[case::empty_id(br#"{"event_id":"","text":"hello"}"#.to_vec(), Outcome::MissingId)]
#[case::numeric_id(br#"{"event_id":42}"#.to_vec(), Outcome::MissingId)]
#[case::not_an_object(b"[1,2,3]".to_vec(), Outcome::MissingId)]
#[tokio::test]
async fn test_unusable_messages_are_dropped(
    store: InMemoryIdempotencyStore,
    #[case] body: Vec<u8>,
    #[case] expected: Outcome,
) {
    let handler = RecordingHandler::new("Notification");

    let outcome = process_message(&body, &store, &handler).await.unwrap();

    assert_eq!(outcome, expected);
    assert_eq!(outcome.disposition(), Disposition::Reject { requeue: false });
    assert_eq!(handler.calls(), 0);
    assert!(store.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_handler_failure_requeues_without_marking(store: InMemoryIdempotencyStore) {
    let handler = RecordingHandler::failing("Notification", 1);

    let first = process_message(&message("e-2"), &store, &handler).await.unwrap();
    assert_eq!(first, Outcome::HandlerFailed);
    assert_eq!(first.disposition(), Disposition::Reject { requeue: true });
    assert!(!store.is_processed("e-2").await.unwrap());

    let second = process_message(&message("e-2"), &store, &handler).await.unwrap();
    assert_eq!(second, Outcome::Handled);
    assert_eq!(handler.calls(), 2);
}

#[rstest]
#[case::read(StoreFailure::Read, 0)]
#[case::write(StoreFailure::Write, 1)]
#[tokio::test]
async fn test_store_errors_propagate(#[case] failure: StoreFailure, #[case] handler_calls: usize) {
    init_test_logging();
    let store = FailingIdempotencyStore::new(failure);
    let handler = RecordingHandler::new("Notification");

    let err = process_message(&message("e-3"), &store, &handler)
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Store(_)));
    assert_eq!(handler.calls(), handler_calls);
}
