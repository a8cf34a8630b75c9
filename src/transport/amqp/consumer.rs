use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use super::AmqpTransport;
use crate::broker::{BrokerChannel, Delivery, QueueOptions};
use crate::bus::Bus;
use crate::error::Result;
use crate::event::short_name;
use crate::progress::{ConsumeStatus, ConsumedLine, Progress};
use crate::transport::ExchangeSpec;

/// One unacknowledged message per consumer.
const PREFETCH: u16 = 1;

impl<C: BrokerChannel> AmqpTransport<C> {
    /// Run one consumer per target until every one of them has stopped.
    pub(super) async fn consume(
        &self,
        bus: Arc<Bus>,
        progress: Arc<dyn Progress>,
        targets: Vec<(&ExchangeSpec, String)>,
    ) {
        info!(consumers = targets.len(), "starting consumers");
        join_all(targets.into_iter().map(|(spec, exchange)| {
            self.consume_exchange(&bus, progress.as_ref(), exchange, spec.queue.clone())
        }))
        .await;
    }

    async fn consume_exchange(
        &self,
        bus: &Bus,
        progress: &dyn Progress,
        exchange: String,
        queue: Option<String>,
    ) {
        match self.run_consumer(bus, progress, &exchange, queue).await {
            Ok(()) => info!(exchange = %exchange, "consumer stream ended"),
            Err(err) => {
                warn!(exchange = %exchange, error = %err, "consumer stopped");
                progress.header(&format!("The consumer has thrown an exception - {err}"));
                progress.header("Consumer stopped");
            }
        }
    }

    async fn run_consumer(
        &self,
        bus: &Bus,
        progress: &dyn Progress,
        exchange: &str,
        queue: Option<String>,
    ) -> Result<()> {
        let queue = match queue {
            Some(queue) => queue,
            None => {
                let queue = self
                    .channel
                    .queue_declare("", QueueOptions::anonymous())
                    .await?;
                self.channel.queue_bind(&queue, exchange).await?;
                debug!(queue = %queue, exchange, "anonymous queue bound");
                queue
            }
        };

        self.channel.basic_qos(PREFETCH).await?;
        let mut deliveries = self.channel.basic_consume(&queue).await?;
        info!(queue = %queue, exchange, "consuming");

        while let Some(delivery) = deliveries.next().await {
            self.handle(bus, progress, delivery?).await?;
        }
        Ok(())
    }

    /// Dispatch one delivery and acknowledge it, whatever the outcome.
    async fn handle(&self, bus: &Bus, progress: &dyn Progress, delivery: Delivery) -> Result<()> {
        let started = Instant::now();

        let (status, event_name) = match self.serializer.decode(&delivery.body) {
            Ok(event) => {
                let event_name = event.short_name().to_string();
                match bus.dispatch(event).await {
                    Ok(()) => (ConsumeStatus::Consumed, event_name),
                    Err(err) => {
                        warn!(event = %event_name, error = %err, "dispatch failed, message dropped");
                        (ConsumeStatus::Rejected, event_name)
                    }
                }
            }
            Err(err) => {
                let event_name = delivery
                    .event_name
                    .as_deref()
                    .map_or("unknown", short_name)
                    .to_string();
                warn!(event = %event_name, error = %err, "undecodable message dropped");
                (ConsumeStatus::Rejected, event_name)
            }
        };

        progress.consumed(&ConsumedLine::new(status, event_name, started.elapsed()));
        self.channel.basic_ack(delivery.delivery_tag).await
    }
}
