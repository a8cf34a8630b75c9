//! AMQP transport: fan-out exchanges, durable queues, explicit acks.

mod consumer;
mod infrastructure;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ExchangeSpec, Transport};
use crate::broker::{BrokerChannel, MessageProperties};
use crate::bus::Bus;
use crate::error::Result;
use crate::event::{Event, JsonSerializer, Serializer};
use crate::progress::Progress;
use crate::router::Router;

/// Transport over a single owned [`BrokerChannel`].
///
/// Every exchange is a durable fan-out exchange. Published messages are
/// persistent and carry the event's logical name in the `event_name`
/// header.
pub struct AmqpTransport<C: BrokerChannel> {
    channel: Arc<C>,
    router: Arc<Router>,
    serializer: Arc<dyn Serializer>,
}

impl<C: BrokerChannel> AmqpTransport<C> {
    /// Build a transport encoding events as JSON.
    pub fn new(channel: Arc<C>, router: Arc<Router>) -> Self {
        Self {
            channel,
            router,
            serializer: Arc::new(JsonSerializer),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Pair every spec with its physical exchange. Any unknown alias fails
    /// the whole batch before the broker is touched.
    fn resolve<'a>(&self, specs: &'a [ExchangeSpec]) -> Result<Vec<(&'a ExchangeSpec, String)>> {
        specs
            .iter()
            .map(|spec| {
                let exchange = self.router.exchange_for_alias(&spec.alias)?;
                Ok((spec, exchange.to_string()))
            })
            .collect()
    }
}

#[cfg(feature = "amqp")]
impl AmqpTransport<crate::broker::LapinChannel> {
    /// Connect to the broker at `dsn` and open the transport's channel.
    pub async fn connect(dsn: &str, router: Arc<Router>) -> Result<Self> {
        let channel = crate::broker::LapinChannel::connect(dsn).await?;
        Ok(Self::new(Arc::new(channel), router))
    }
}

#[async_trait]
impl<C: BrokerChannel> Transport for AmqpTransport<C> {
    fn name(&self) -> &str {
        "AMQP"
    }

    async fn create_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress) -> Result<()> {
        let targets = self.resolve(specs)?;
        self.create(&targets, progress).await;
        Ok(())
    }

    async fn drop_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress) -> Result<()> {
        let targets = self.resolve(specs)?;
        self.drop_all(&targets, progress).await;
        Ok(())
    }

    async fn check_infrastructure(&self, specs: &[ExchangeSpec], progress: &dyn Progress) -> Result<()> {
        let targets = self.resolve(specs)?;
        self.check(&targets, progress).await;
        Ok(())
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        let exchanges = self.router.exchanges_for_event(event)?;
        if exchanges.is_empty() {
            debug!(event_type = %event.event_type, "no route, event not published");
            return Ok(());
        }

        let body = self.serializer.encode(event)?;
        for exchange in &exchanges {
            self.channel
                .basic_publish(
                    exchange,
                    &body,
                    MessageProperties {
                        persistent: true,
                        event_name: Some(event.display_name().to_string()),
                    },
                )
                .await?;
            debug!(event_type = %event.event_type, exchange = %exchange, "event published");
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        bus: Arc<Bus>,
        progress: Arc<dyn Progress>,
        specs: &[ExchangeSpec],
    ) -> Result<()> {
        let targets = self.resolve(specs)?;
        self.consume(bus, progress, targets).await;
        Ok(())
    }
}
