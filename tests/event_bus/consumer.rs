use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use amqp_event_bus::broker::MemoryBroker;
use amqp_event_bus::commands::ExitStatus;
use amqp_event_bus::progress::BufferedProgress;
use amqp_event_bus::{
    Bus, BusConfig, BusError, Buses, FnMiddleware, LocalListeners, MiddlewareRegistry, Next,
    Transport,
};

use crate::support::{amqp, create, entries, event, eventually, log, spawn_consumer};

#[tokio::test]
async fn published_event_is_consumed_exactly_once() {
    let broker = MemoryBroker::new();
    let transport = amqp(
        &broker,
        crate::support::router(&[("EventA", "evt")], &[("evt", "real_evt")]),
    );
    create(transport.as_ref(), &["evt"]).await;

    let handled = log();
    let mut listeners = LocalListeners::new();
    let seen = Arc::clone(&handled);
    listeners.on("EventA", move |event| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().unwrap().push(event.id);
            Ok(())
        }
    });
    let config = BusConfig::from_toml_str("[async_adapter]\nadapter = \"amqp\"\npass_through = false\n")
        .unwrap();
    let buses = Buses::from_config(
        &config,
        &MiddlewareRegistry::new(),
        Some(Arc::clone(&transport) as Arc<dyn Transport>),
        listeners,
    )
    .unwrap();

    let progress = BufferedProgress::new();
    let consumer = spawn_consumer(
        Arc::clone(&transport),
        Arc::clone(&buses.inline_event_bus),
        &progress,
        &["evt"],
    );
    eventually("the anonymous queue to be bound", || {
        broker.bindings("real_evt").len() == 1
    })
    .await;

    buses.event_bus.dispatch(event("evt-1", "EventA")).await.unwrap();
    // Not pass-through: the publishing side never notifies its own listeners.
    assert!(entries(&handled).is_empty());

    eventually("the consumed line", || {
        !progress.lines_starting_with("Consumed EventA").is_empty()
    })
    .await;
    broker.close();
    assert_eq!(consumer.await.unwrap(), ExitStatus::Success);

    assert_eq!(progress.lines_starting_with("Consumed EventA").len(), 1);
    assert!(progress.lines_starting_with("Rejected").is_empty());
    assert_eq!(entries(&handled), ["evt-1"]);
    assert_eq!(
        &progress.lines()[..3],
        ["Consumer built", "Using adapter AMQP", "Started listening..."]
    );
}

#[tokio::test]
async fn failing_handler_still_acks() {
    let broker = MemoryBroker::new();
    let transport = amqp(
        &broker,
        crate::support::router(&[("_all", "events")], &[("events", "real_events")]),
    );
    create(transport.as_ref(), &["events:orders"]).await;

    let inline_bus = Arc::new(
        Bus::builder()
            .middleware(Arc::new(FnMiddleware::new(
                "Failing",
                "dispatch",
                |_event, _next: Next| async { Err(BusError::MiddlewareFailure("always".into())) },
            )))
            .build(),
    );

    transport.publish(&event("evt-1", "Event1")).await.unwrap();
    assert_eq!(broker.queue_depth("orders"), 1);

    let progress = BufferedProgress::new();
    let consumer = spawn_consumer(Arc::clone(&transport), inline_bus, &progress, &["events:orders"]);

    eventually("the queue to drain", || broker.queue_depth("orders") == 0).await;
    // Give a redelivery the chance to show up.
    tokio::time::sleep(Duration::from_millis(30)).await;
    broker.close();
    consumer.await.unwrap();

    assert_eq!(broker.queue_depth("orders"), 0);
    assert_eq!(progress.lines_starting_with("Rejected Event1").len(), 1);
    assert!(progress.lines_starting_with("Consumed").is_empty());
}

#[tokio::test]
async fn slow_handler_holds_the_next_delivery() {
    let broker = MemoryBroker::new();
    let transport = amqp(
        &broker,
        crate::support::router(&[("_others", "events")], &[("events", "real_events")]),
    );
    create(transport.as_ref(), &["events:orders"]).await;

    let in_flight_peak = Arc::new(AtomicUsize::new(0));
    let order = log();
    let inline_bus = {
        let broker = broker.clone();
        let peak = Arc::clone(&in_flight_peak);
        let order = Arc::clone(&order);
        Arc::new(
            Bus::builder()
                .middleware(Arc::new(FnMiddleware::new(
                    "Slow",
                    "dispatch",
                    move |event, next: Next| {
                        let broker = broker.clone();
                        let peak = Arc::clone(&peak);
                        let order = Arc::clone(&order);
                        async move {
                            peak.fetch_max(broker.unacked_count(), Ordering::SeqCst);
                            order.lock().unwrap().push(event.id.clone());
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            peak.fetch_max(broker.unacked_count(), Ordering::SeqCst);
                            next.run(event).await
                        }
                    },
                )))
                .build(),
        )
    };

    for id in ["evt-1", "evt-2", "evt-3"] {
        transport.publish(&event(id, "Event1")).await.unwrap();
    }

    let progress = BufferedProgress::new();
    let consumer = spawn_consumer(Arc::clone(&transport), inline_bus, &progress, &["events:orders"]);

    eventually("three consumed lines", || {
        progress.lines_starting_with("Consumed Event1").len() == 3
    })
    .await;
    broker.close();
    consumer.await.unwrap();

    assert_eq!(in_flight_peak.load(Ordering::SeqCst), 1);
    assert_eq!(entries(&order), ["evt-1", "evt-2", "evt-3"]);
}

#[tokio::test]
async fn one_failed_subscription_does_not_stop_the_others() {
    let broker = MemoryBroker::new();
    let transport = amqp(
        &broker,
        crate::support::router(
            &[("_all", "events")],
            &[("events", "real_events"), ("audit", "real_audit")],
        ),
    );
    create(transport.as_ref(), &["events:orders", "audit"]).await;

    let progress = BufferedProgress::new();
    let consumer = spawn_consumer(
        Arc::clone(&transport),
        Arc::new(Bus::builder().build()),
        &progress,
        &["audit:missing_queue", "events:orders"],
    );

    eventually("the failed consumer to stop", || {
        progress.lines().iter().any(|l| l == "Consumer stopped")
    })
    .await;
    transport.publish(&event("evt-1", "Event1")).await.unwrap();
    eventually("the healthy consumer to consume", || {
        progress.lines_starting_with("Consumed Event1").len() == 1
    })
    .await;
    broker.close();
    consumer.await.unwrap();

    assert_eq!(
        progress
            .lines_starting_with("The consumer has thrown an exception - ")
            .len(),
        1
    );
}

#[tokio::test]
async fn unknown_alias_fails_before_consuming() {
    let broker = MemoryBroker::new();
    let transport = amqp(
        &broker,
        crate::support::router(&[], &[("events", "real_events")]),
    );

    let progress = BufferedProgress::new();
    let status = spawn_consumer(
        Arc::clone(&transport),
        Arc::new(Bus::builder().build()),
        &progress,
        &["events", "nope"],
    )
    .await
    .unwrap();

    assert_eq!(status, ExitStatus::Failure);
    assert!(progress
        .lines()
        .contains(&"The consumer has thrown an exception - Exchange with name nope is not configured".to_string()));
    assert!(broker.bindings("real_events").is_empty());
}
