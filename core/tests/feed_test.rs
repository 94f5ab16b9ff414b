//! EventFeed tests: push event fan-out and wire format

use meshscope_core::{EventFeed, ModelEvent};
use serde_json::json;

#[tokio::test]
async fn feed_delivers_to_all_subscribers() {
    let feed = EventFeed::new(16);
    let mut rx1 = feed.subscribe();
    let mut rx2 = feed.subscribe();
    assert_eq!(feed.subscriber_count(), 2);

    feed.publish(ModelEvent::new("Service", json!({"id": 1})));

    assert_eq!(rx1.try_recv().expect("rx1 should receive event").model, "Service");
    assert_eq!(rx2.try_recv().expect("rx2 should receive event").model, "Service");
}

#[tokio::test]
async fn feed_handles_no_subscribers() {
    let feed = EventFeed::new(8);
    // Should not panic with no subscribers
    feed.publish(ModelEvent::new("Tenant", json!({"id": 2})));
    assert_eq!(feed.subscriber_count(), 0);
}

#[test]
fn event_decodes_from_wire_format() {
    let event: ModelEvent = serde_json::from_value(json!({
        "model": "Tenant",
        "msg": {
            "changed_fields": ["deleted", "updated"],
            "object": {"id": 4, "kind": "vsg"},
            "pk": 4
        }
    }))
    .unwrap();

    assert_eq!(event.model, "Tenant");
    assert!(event.is_deleted());
    assert_eq!(event.msg.pk, Some(4));
    assert_eq!(event.msg.object["kind"], "vsg");
}

#[test]
fn event_without_changed_fields_is_an_upsert() {
    let event: ModelEvent =
        serde_json::from_value(json!({"model": "Service", "msg": {"object": {"id": 1}}})).unwrap();
    assert!(!event.is_deleted());
    assert!(event.msg.pk.is_none());
}
