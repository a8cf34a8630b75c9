use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info};

use super::{
    BrokerChannel, Delivery, ExchangeOptions, MessageProperties, QueueOptions, EVENT_NAME_HEADER,
};
use crate::error::{BusError, Result};

const PERSISTENT: u8 = 2;

/// A channel on a real AMQP 0-9-1 broker.
///
/// A failed passive declare makes the broker close the channel; run
/// infrastructure checks on a dedicated channel.
pub struct LapinChannel {
    // Keeps the connection open for as long as the channel is in use.
    _connection: Option<Connection>,
    channel: Channel,
}

impl LapinChannel {
    /// Open a connection to `dsn` and a channel on it.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let connection = Connection::connect(dsn, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::broker("connect", dsn, e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::broker("channel_open", dsn, e))?;
        info!(channel = channel.id(), "connected to AMQP broker");

        Ok(Self {
            _connection: Some(connection),
            channel,
        })
    }

    /// Wrap a channel whose connection is owned elsewhere.
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            _connection: None,
            channel,
        }
    }
}

fn header_value(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn exchange_declare(&self, exchange: &str, options: ExchangeOptions) -> Result<()> {
        debug!(exchange, passive = options.passive, "exchange.declare");
        self.channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    passive: options.passive,
                    durable: options.durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::broker("exchange_declare", exchange, e))
    }

    async fn exchange_delete(&self, exchange: &str) -> Result<()> {
        debug!(exchange, "exchange.delete");
        self.channel
            .exchange_delete(exchange, ExchangeDeleteOptions::default())
            .await
            .map_err(|e| BusError::broker("exchange_delete", exchange, e))
    }

    async fn queue_declare(&self, queue: &str, options: QueueOptions) -> Result<String> {
        debug!(queue, passive = options.passive, "queue.declare");
        let declared = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: options.passive,
                    durable: options.durable,
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::broker("queue_declare", queue, e))?;
        Ok(declared.name().as_str().to_string())
    }

    async fn queue_delete(&self, queue: &str) -> Result<()> {
        debug!(queue, "queue.delete");
        self.channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BusError::broker("queue_delete", queue, e))
    }

    async fn queue_bind(&self, queue: &str, exchange: &str) -> Result<()> {
        debug!(queue, exchange, "queue.bind");
        self.channel
            .queue_bind(
                queue,
                exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::broker("queue_bind", queue, e))
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        body: &[u8],
        properties: MessageProperties,
    ) -> Result<()> {
        let mut amqp_properties = BasicProperties::default();
        if properties.persistent {
            amqp_properties = amqp_properties.with_delivery_mode(PERSISTENT);
        }
        if let Some(name) = properties.event_name {
            let mut headers = FieldTable::default();
            headers.insert(
                ShortString::from(EVENT_NAME_HEADER),
                AMQPValue::LongString(name.into()),
            );
            amqp_properties = amqp_properties.with_headers(headers);
        }

        self.channel
            .basic_publish(
                exchange,
                "",
                BasicPublishOptions::default(),
                body,
                amqp_properties,
            )
            .await
            .map_err(|e| BusError::broker("basic_publish", exchange, e))?
            .await
            .map(|_| ())
            .map_err(|e| BusError::broker("basic_publish", exchange, e))
    }

    async fn basic_qos(&self, prefetch_count: u16) -> Result<()> {
        self.channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::broker("basic_qos", "channel", e))
    }

    async fn basic_consume(&self, queue: &str) -> Result<BoxStream<'static, Result<Delivery>>> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::broker("basic_consume", queue, e))?;

        let queue = queue.to_string();
        Ok(consumer
            .map(move |delivery| {
                let delivery = delivery.map_err(|e| BusError::broker("consume", queue.as_str(), e))?;
                let event_name = delivery
                    .properties
                    .headers()
                    .as_ref()
                    .and_then(|headers| {
                        headers
                            .inner()
                            .iter()
                            .find(|(key, _)| key.as_str() == EVENT_NAME_HEADER)
                            .and_then(|(_, value)| header_value(value))
                    });
                Ok(Delivery {
                    delivery_tag: delivery.delivery_tag,
                    body: delivery.data,
                    event_name,
                })
            })
            .boxed())
    }

    async fn basic_ack(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| BusError::broker("basic_ack", delivery_tag.to_string(), e))
    }
}
