use std::sync::Arc;

use amqp_event_bus::{BusConfig, Buses, InMemoryTransport, LocalListeners, Transport};

use crate::support::{entries, event, log, recording_registry, router, Log};

fn setup(pass_through: bool, middlewares: &str, log: &Log) -> (Buses, Arc<InMemoryTransport>) {
    let config = BusConfig::from_toml_str(&format!(
        "middlewares = {middlewares}\n[exchanges]\nevents = \"real_events\"\n[router]\nEvent1 = \"events\"\n[async_adapter]\nadapter = \"in_memory\"\npass_through = {pass_through}\n"
    ))
    .unwrap();
    let transport = Arc::new(InMemoryTransport::new(router(
        &[("Event1", "events")],
        &[("events", "real_events")],
    )));

    let mut listeners = LocalListeners::new();
    let seen = Arc::clone(log);
    listeners.on("Event1", move |_event| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().unwrap().push("listener".to_string());
            Ok(())
        }
    });

    let buses = Buses::from_config(
        &config,
        &recording_registry(&["Middleware1", "Middleware2"], log),
        Some(Arc::clone(&transport) as Arc<dyn Transport>),
        listeners,
    )
    .unwrap();
    (buses, transport)
}

#[tokio::test]
async fn publish_ends_the_chain_without_pass_through() {
    let log = log();
    let (buses, transport) = setup(false, r#"["Middleware1", "@async", "Middleware2"]"#, &log);

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();

    assert_eq!(transport.published_to("real_events").len(), 1);
    assert_eq!(entries(&log), ["before Middleware1", "after Middleware1"]);
}

#[tokio::test]
async fn publish_first_when_marker_is_absent() {
    let log = log();
    let (buses, transport) = setup(false, r#"["Middleware1", "Middleware2"]"#, &log);

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();

    assert_eq!(transport.published_to("real_events").len(), 1);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn pass_through_runs_the_rest_of_the_chain_and_listeners() {
    let log = log();
    let (buses, transport) = setup(true, r#"["Middleware1", "@async", "Middleware2"]"#, &log);

    buses.event_bus.dispatch(event("evt-1", "Event1")).await.unwrap();

    assert_eq!(transport.published_to("real_events").len(), 1);
    assert_eq!(
        entries(&log),
        [
            "before Middleware1",
            "before Middleware2",
            "after Middleware2",
            "after Middleware1",
            "listener",
        ]
    );
}

#[tokio::test]
async fn inline_bus_never_publishes() {
    let log = log();
    let (buses, transport) = setup(false, r#"["Middleware1", "@async", "Middleware2"]"#, &log);

    buses
        .inline_event_bus
        .dispatch(event("evt-1", "Event1"))
        .await
        .unwrap();

    assert!(transport.published().is_empty());
    assert_eq!(entries(&log).last().map(String::as_str), Some("listener"));
    assert_eq!(entries(&log).len(), 5);
}

#[tokio::test]
async fn unrouted_events_still_run_locally() {
    let log = log();
    let (buses, transport) = setup(true, r#"["Middleware1"]"#, &log);

    buses.event_bus.dispatch(event("evt-1", "Event2")).await.unwrap();

    assert!(transport.published().is_empty());
    assert_eq!(entries(&log), ["before Middleware1", "after Middleware1"]);
}
