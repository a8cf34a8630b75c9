use amqp_event_bus::broker::{MemoryBroker, QueueOptions};
use amqp_event_bus::commands::{self, ExitStatus};
use amqp_event_bus::progress::BufferedProgress;
use amqp_event_bus::ExchangeSpec;

use crate::support::{amqp, create, router};

fn specs(selectors: &[&str]) -> Vec<ExchangeSpec> {
    ExchangeSpec::parse_all(selectors)
}

#[tokio::test]
async fn create_is_idempotent() {
    let broker = MemoryBroker::new();
    let transport = amqp(&broker, router(&[], &[("events", "real_events")]));

    create(transport.as_ref(), &["events:orders"]).await;
    let second = create(transport.as_ref(), &["events:orders"]).await;

    assert!(second.lines().iter().all(|line| !line.contains("could not")));
    assert_eq!(broker.bindings("real_events"), vec!["orders"]);
    assert_eq!(broker.queue_options("orders"), Some(QueueOptions::durable()));
}

#[tokio::test]
async fn failures_are_isolated_per_resource() {
    let broker = MemoryBroker::new();
    broker.fail_on("real_audit");
    let transport = amqp(
        &broker,
        router(&[], &[("events", "real_events"), ("audit", "real_audit")]),
    );

    let progress = create(transport.as_ref(), &["audit", "events:orders"]).await;

    let lines = progress.lines();
    assert!(lines.contains(
        &"Exchange with name audit could not be created. Reason - injected failure".to_string()
    ));
    assert!(lines.contains(&"Exchange with name events created properly".to_string()));
    assert!(lines.contains(
        &"Queue with name orders bound properly to exchange with name events".to_string()
    ));
    assert_eq!(lines.last().map(String::as_str), Some("Infrastructure created"));
}

#[tokio::test]
async fn unknown_alias_fails_the_whole_command() {
    let broker = MemoryBroker::new();
    let transport = amqp(&broker, router(&[], &[("events", "real_events")]));
    let progress = BufferedProgress::new();

    let status = commands::create_infrastructure(
        transport.as_ref(),
        &specs(&["events:orders", "nope"]),
        true,
        &progress,
    )
    .await;

    assert_eq!(status, ExitStatus::Failure);
    assert_eq!(status.code(), 1);
    assert_eq!(
        progress.lines().last().map(String::as_str),
        Some("Exception thrown. Reason - Exchange with name nope is not configured")
    );
    assert!(!broker.has_exchange("real_events"));
    assert!(!broker.has_queue("orders"));
}

#[tokio::test]
async fn check_then_drop_then_check() {
    let broker = MemoryBroker::new();
    let transport = amqp(&broker, router(&[], &[("events", "real_events")]));
    let selectors = specs(&["events:orders"]);
    create(transport.as_ref(), &["events:orders"]).await;

    let present = BufferedProgress::new();
    let status =
        commands::check_infrastructure(transport.as_ref(), &selectors, true, &present).await;
    assert_eq!(status, ExitStatus::Success);
    assert_eq!(
        present.lines(),
        [
            "Started checking infrastructure...",
            "Using adapter AMQP",
            "Exchange with name events exists",
            "Queue with name orders exists",
            "Infrastructure checked",
        ]
    );

    let dropped = BufferedProgress::new();
    commands::drop_infrastructure(transport.as_ref(), &selectors, true, &dropped).await;
    assert!(dropped
        .lines()
        .contains(&"Queue with name orders deleted properly".to_string()));

    let absent = BufferedProgress::new();
    commands::check_infrastructure(transport.as_ref(), &selectors, true, &absent).await;
    let absent = absent.lines();
    assert!(absent[2].starts_with("Exchange with name events does not exist. Reason - NOT_FOUND"));
    assert!(absent[3].starts_with("Queue with name orders does not exist. Reason - NOT_FOUND"));
}

#[tokio::test]
async fn anonymous_spec_creates_only_the_exchange() {
    let broker = MemoryBroker::new();
    let transport = amqp(&broker, router(&[], &[("events", "real_events")]));

    let progress = create(transport.as_ref(), &["events"]).await;

    assert!(broker.has_exchange("real_events"));
    assert!(broker.bindings("real_events").is_empty());
    assert_eq!(
        progress.lines(),
        [
            "Started building infrastructure...",
            "Using adapter AMQP",
            "Exchange with name events created properly",
            "Infrastructure created",
        ]
    );
}
