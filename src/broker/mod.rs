//! Broker channel: the AMQP 0-9-1 operations the transport needs.
//!
//! One channel is owned by one [`AmqpTransport`](crate::transport::AmqpTransport)
//! for its lifetime. [`LapinChannel`] talks to a real broker;
//! [`MemoryBroker`] is an in-process broker with the same semantics.

#[cfg(feature = "amqp")]
mod lapin_channel;
mod memory;

#[cfg(feature = "amqp")]
pub use lapin_channel::LapinChannel;
pub use memory::{MemoryBroker, PublishedMessage};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;

/// Message header carrying the event's logical name.
pub const EVENT_NAME_HEADER: &str = "event_name";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Only check that the exchange exists.
    pub passive: bool,
    pub durable: bool,
}

impl ExchangeOptions {
    pub fn durable() -> Self {
        Self {
            passive: false,
            durable: true,
        }
    }

    pub fn passive() -> Self {
        Self {
            passive: true,
            durable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueOptions {
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Self::default()
        }
    }

    pub fn passive() -> Self {
        Self {
            passive: true,
            ..Self::default()
        }
    }

    /// Broker-named, exclusive and deleted with its consumer.
    pub fn anonymous() -> Self {
        Self {
            exclusive: true,
            auto_delete: true,
            ..Self::default()
        }
    }
}

/// Properties attached to a published message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// `delivery_mode = 2`.
    pub persistent: bool,
    pub event_name: Option<String>,
}

/// A message handed to a consumer, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub event_name: Option<String>,
}

#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Declare a fan-out exchange.
    async fn exchange_declare(&self, exchange: &str, options: ExchangeOptions) -> Result<()>;

    async fn exchange_delete(&self, exchange: &str) -> Result<()>;

    /// Declare a queue and return its effective name. An empty `queue`
    /// asks the broker to generate one.
    async fn queue_declare(&self, queue: &str, options: QueueOptions) -> Result<String>;

    async fn queue_delete(&self, queue: &str) -> Result<()>;

    async fn queue_bind(&self, queue: &str, exchange: &str) -> Result<()>;

    async fn basic_publish(
        &self,
        exchange: &str,
        body: &[u8],
        properties: MessageProperties,
    ) -> Result<()>;

    /// Limit unacknowledged deliveries for consumers started afterwards.
    async fn basic_qos(&self, prefetch_count: u16) -> Result<()>;

    /// Start an explicit-ack consumer on `queue`. The stream ends when the
    /// channel closes.
    async fn basic_consume(&self, queue: &str) -> Result<BoxStream<'static, Result<Delivery>>>;

    async fn basic_ack(&self, delivery_tag: u64) -> Result<()>;
}
