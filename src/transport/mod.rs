//! Transports: where the publish step sends events.
//!
//! A [`Transport`] publishes events to the exchanges the
//! [`Router`](crate::router::Router) resolves, manages the broker
//! infrastructure behind them and runs consumers that feed received
//! events back into a bus.
//!
//! - [`AmqpTransport`] works over any [`BrokerChannel`](crate::broker::BrokerChannel).
//! - [`InMemoryTransport`] only records what was published.

mod amqp;
mod in_memory;

pub use amqp::AmqpTransport;
pub use in_memory::InMemoryTransport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::Bus;
use crate::error::Result;
use crate::event::Event;
use crate::progress::Progress;

/// One `alias[:queue]` selector from an operational command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeSpec {
    pub alias: String,
    /// Named queue; `None` means an anonymous, broker-named queue.
    pub queue: Option<String>,
}

impl ExchangeSpec {
    pub fn new(alias: impl Into<String>, queue: Option<String>) -> Self {
        Self {
            alias: alias.into(),
            queue,
        }
    }

    /// Parse `alias` or `alias:queue`. An empty queue part is anonymous.
    pub fn parse(selector: &str) -> Self {
        match selector.split_once(':') {
            Some((alias, queue)) => {
                let queue = queue.trim();
                Self::new(alias.trim(), (!queue.is_empty()).then(|| queue.to_string()))
            }
            None => Self::new(selector.trim(), None),
        }
    }

    /// Parse several selectors. A repeated alias keeps its position and
    /// takes the last queue given for it.
    pub fn parse_all<S: AsRef<str>>(selectors: &[S]) -> Vec<Self> {
        let mut specs: Vec<Self> = Vec::new();
        for spec in selectors.iter().map(|s| Self::parse(s.as_ref())) {
            match specs.iter_mut().find(|known| known.alias == spec.alias) {
                Some(known) => known.queue = spec.queue,
                None => specs.push(spec),
            }
        }
        specs
    }
}

impl fmt::Display for ExchangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.queue {
            Some(queue) => write!(f, "{}:{}", self.alias, queue),
            None => f.write_str(&self.alias),
        }
    }
}

/// Publishes events and manages the infrastructure behind them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable name, for diagnostics.
    fn name(&self) -> &str;

    /// Declare every exchange (and named queue, bound to it). Each resource
    /// is reported on its own; one failure does not stop the others.
    async fn create_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress)
        -> Result<()>;

    /// Delete every exchange and named queue.
    async fn drop_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress)
        -> Result<()>;

    /// Report which exchanges and named queues exist, without creating any.
    ///
    /// On a real AMQP broker a failed passive declare closes the channel, so
    /// later calls on the same transport, publishes included, fail too. Run
    /// checks on a transport dedicated to them.
    async fn check_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress)
        -> Result<()>;

    /// Publish to every exchange the router resolves for `event`.
    async fn publish(&self, event: &Event) -> Result<()>;

    /// Consume from every spec, dispatching each received event on `bus`.
    /// Returns once every consumer has stopped.
    async fn subscribe(
        &self,
        bus: Arc<Bus>,
        progress: Arc<dyn Progress>,
        specs: &[ExchangeSpec],
    ) -> Result<()>;
}
