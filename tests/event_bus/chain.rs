use std::sync::Arc;

use amqp_event_bus::{BusConfig, BusError, Buses, Distribution, LocalListeners, Next};

use crate::support::{entries, event, log, recording_registry};

fn buses(distribution: &str, log: &crate::support::Log) -> Buses {
    let config = BusConfig::from_toml_str(&format!(
        "middlewares = [\"A\", \"B\", \"C\"]\ndistribution = \"{distribution}\"\n"
    ))
    .unwrap();
    Buses::from_config(
        &config,
        &recording_registry(&["A", "B", "C"], log),
        None,
        LocalListeners::new(),
    )
    .unwrap()
}

const EXPECTED: [&str; 6] = [
    "before A", "before B", "before C", "after C", "after B", "after A",
];

#[tokio::test]
async fn inline_chain_runs_in_declaration_order() {
    let log = log();
    let buses = buses("inline", &log);
    assert_eq!(buses.event_bus.distribution(), Distribution::Inline);

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();

    assert_eq!(entries(&log), EXPECTED);
}

#[tokio::test(flavor = "current_thread")]
async fn next_tick_chain_keeps_the_same_order() {
    let log = log();
    let buses = buses("next_tick", &log);
    assert_eq!(buses.event_bus.distribution(), Distribution::NextTick);

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();

    assert_eq!(entries(&log), EXPECTED);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_next_tick_dispatches_interleave() {
    let log = log();
    let buses = buses("next_tick", &log);

    let (first, second) = tokio::join!(
        buses.event_bus.dispatch(event("evt-1", "Event1")),
        buses.inline_event_bus.dispatch(event("evt-2", "Event2")),
    );
    first.unwrap();
    second.unwrap();

    let entries = entries(&log);
    assert_eq!(entries.len(), 12);
    // Both chains yield before their first step, so neither runs to completion first.
    assert_eq!(&entries[..2], ["before A", "before A"]);
}

#[tokio::test]
async fn unresolvable_middleware_fails_bus_construction() {
    let config = BusConfig::from_toml_str("middlewares = [\"Missing::handle\"]\n").unwrap();
    let result = Buses::from_config(&config, &recording_registry(&[], &log()), None, LocalListeners::new());

    assert!(matches!(result, Err(BusError::InvalidMiddleware(ref r)) if r == "Missing::handle"));
}

#[tokio::test]
async fn first_failing_middleware_rejects_the_dispatch() {
    let log = log();
    let registry = recording_registry(&["A", "C"], &log).register_fn(
        "B",
        "dispatch",
        |_event, _next: Next| async { Err(BusError::MiddlewareFailure("B refused".into())) },
    );
    let config = BusConfig::from_toml_str("middlewares = [\"A\", \"B\", \"C\"]\n").unwrap();
    let buses = Buses::from_config(&config, &registry, None, LocalListeners::new()).unwrap();

    let result = buses.event_bus.dispatch(event("evt-1", "Event1")).await;

    assert_eq!(result, Err(BusError::MiddlewareFailure("B refused".into())));
    assert_eq!(entries(&log), ["before A"]);
}

#[tokio::test]
async fn invalid_event_is_rejected_before_the_chain() {
    let log = log();
    let buses = buses("inline", &log);

    let result = buses
        .event_bus
        .dispatch(amqp_event_bus::Event::new("evt-1", "  ", Vec::new()))
        .await;

    assert_eq!(result, Err(BusError::InvalidEvent));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn listeners_are_shared_by_both_buses() {
    let log = log();
    let mut listeners = LocalListeners::new();
    let seen = Arc::clone(&log);
    listeners.on("Event1", move |event| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().unwrap().push(format!("listener {}", event.id));
            Ok(())
        }
    });
    let config = BusConfig::default();
    let buses = Buses::from_config(&config, &recording_registry(&[], &log), None, listeners).unwrap();

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();
    buses.inline_event_bus.dispatch(event("evt-2", "Event1")).await.unwrap();

    assert_eq!(entries(&log), ["listener evt-1", "listener evt-2"]);
}
