use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{ExchangeSpec, Transport};
use crate::bus::Bus;
use crate::error::{BusError, Result};
use crate::event::Event;
use crate::progress::Progress;
use crate::router::Router;

/// Transport that records published events per exchange.
///
/// Useful for tests and for environments without a broker. Clones share
/// the same record.
///
/// ## Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use amqp_event_bus::{Event, InMemoryTransport, Router, Transport};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let router = Router::new(
///     HashMap::from([("OrderPlaced".to_string(), "orders".to_string())]),
///     HashMap::from([("orders".to_string(), "orders_exchange".to_string())]),
/// ).unwrap();
/// let transport = InMemoryTransport::new(Arc::new(router));
///
/// transport.publish(&Event::new("evt-1", "shop::OrderPlaced", vec![])).await.unwrap();
/// assert_eq!(transport.published_to("orders_exchange").len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryTransport {
    router: Arc<Router>,
    published: Arc<Mutex<HashMap<String, Vec<Event>>>>,
}

impl InMemoryTransport {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            published: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn record(&self) -> MutexGuard<'_, HashMap<String, Vec<Event>>> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything published, keyed by exchange name.
    pub fn published(&self) -> HashMap<String, Vec<Event>> {
        self.record().clone()
    }

    /// Events published to `exchange`, in publish order.
    pub fn published_to(&self, exchange: &str) -> Vec<Event> {
        self.record().get(exchange).cloned().unwrap_or_default()
    }

    /// Type identities published to `exchange`, in publish order.
    pub fn event_types(&self, exchange: &str) -> Vec<String> {
        self.published_to(exchange)
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }

    pub fn clear(&self) {
        self.record().clear();
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        "In Memory"
    }

    async fn create_infrastructure(&self, _specs: &[ExchangeSpec], _progress: &dyn Progress) -> Result<()> {
        Ok(())
    }

    async fn drop_infrastructure(&self, _specs: &[ExchangeSpec], _progress: &dyn Progress) -> Result<()> {
        Ok(())
    }

    async fn check_infrastructure(&self, _specs: &[ExchangeSpec], _progress: &dyn Progress) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        let exchanges = self.router.exchanges_for_event(event)?;
        debug!(event_type = %event.event_type, ?exchanges, "recording event");

        let mut record = self.record();
        for exchange in exchanges {
            record.entry(exchange).or_default().push(event.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        _bus: Arc<Bus>,
        _progress: Arc<dyn Progress>,
        _specs: &[ExchangeSpec],
    ) -> Result<()> {
        Err(BusError::UnsupportedOperation(self.name().to_string()))
    }
}
