//! Shared fixtures for the event bus integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amqp_event_bus::broker::MemoryBroker;
use amqp_event_bus::commands::{self, ExitStatus};
use amqp_event_bus::progress::{BufferedProgress, Progress};
use amqp_event_bus::{
    AmqpTransport, Bus, Event, ExchangeSpec, MiddlewareRegistry, Next, Router, Transport,
};
use tokio::task::JoinHandle;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn event(id: &str, name: &str) -> Event {
    Event::with_string_payload(id, format!("app::events::{name}"), "{}")
}

/// Registry where every handler records `"before X"` and `"after X"`.
pub fn recording_registry(handlers: &[&str], log: &Log) -> MiddlewareRegistry {
    handlers.iter().fold(MiddlewareRegistry::new(), |registry, handler| {
        let log = Arc::clone(log);
        let name = handler.to_string();
        registry.register_fn(handler, "dispatch", move |event, next: Next| {
            let log = Arc::clone(&log);
            let name = name.clone();
            async move {
                log.lock().unwrap().push(format!("before {name}"));
                next.run(event).await?;
                log.lock().unwrap().push(format!("after {name}"));
                Ok(())
            }
        })
    })
}

pub fn router(routes: &[(&str, &str)], exchanges: &[(&str, &str)]) -> Arc<Router> {
    let map = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };
    Arc::new(Router::new(map(routes), map(exchanges)).unwrap())
}

pub fn amqp(broker: &MemoryBroker, router: Arc<Router>) -> Arc<AmqpTransport<MemoryBroker>> {
    Arc::new(AmqpTransport::new(Arc::new(broker.clone()), router))
}

/// Run the consume command in the background.
pub fn spawn_consumer(
    transport: Arc<AmqpTransport<MemoryBroker>>,
    bus: Arc<Bus>,
    progress: &BufferedProgress,
    selectors: &[&str],
) -> JoinHandle<ExitStatus> {
    let specs = ExchangeSpec::parse_all(selectors);
    let progress: Arc<dyn Progress> = Arc::new(progress.clone());
    tokio::spawn(async move { commands::consume_events(transport.as_ref(), bus, &specs, progress).await })
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

pub async fn create(transport: &dyn Transport, selectors: &[&str]) -> BufferedProgress {
    let progress = BufferedProgress::new();
    let status = commands::create_infrastructure(
        transport,
        &ExchangeSpec::parse_all(selectors),
        true,
        &progress,
    )
    .await;
    assert_eq!(status, ExitStatus::Success);
    progress
}
