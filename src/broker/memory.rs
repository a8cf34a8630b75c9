use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::Notify;
use tracing::debug;

use super::{BrokerChannel, Delivery, ExchangeOptions, MessageProperties, QueueOptions};
use crate::error::{BusError, Result};

/// A message as it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub body: Vec<u8>,
    pub event_name: Option<String>,
    pub persistent: bool,
}

#[derive(Debug, Clone)]
struct Message {
    body: Vec<u8>,
    event_name: Option<String>,
}

#[derive(Debug, Default)]
struct Exchange {
    bindings: Vec<String>,
}

#[derive(Debug)]
struct Queue {
    options: QueueOptions,
    ready: VecDeque<Message>,
    consumers: usize,
}

#[derive(Debug)]
struct Unacked {
    queue: String,
    consumer: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct State {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Queue>,
    // Ordered by tag so requeues keep publish order.
    unacked: BTreeMap<u64, Unacked>,
    prefetch: Option<u16>,
    next_tag: u64,
    next_consumer: u64,
    next_anonymous: u64,
    failures: HashSet<String>,
    published: Vec<PublishedMessage>,
    closed: bool,
}

impl State {
    fn guard(&self, operation: &'static str, resource: &str) -> Result<()> {
        if self.closed {
            return Err(BusError::broker(operation, resource, "CHANNEL_ERROR - channel is closed"));
        }
        if self.failures.contains(resource) {
            return Err(BusError::broker(operation, resource, "injected failure"));
        }
        Ok(())
    }

    fn in_flight(&self, consumer: u64) -> usize {
        self.unacked.values().filter(|u| u.consumer == consumer).count()
    }

    fn remove_queue(&mut self, queue: &str) {
        self.queues.remove(queue);
        for exchange in self.exchanges.values_mut() {
            exchange.bindings.retain(|bound| bound != queue);
        }
        self.unacked.retain(|_, unacked| unacked.queue != queue);
    }
}

fn not_found(operation: &'static str, kind: &str, name: &str) -> BusError {
    BusError::broker(
        operation,
        name,
        format!("NOT_FOUND - no {kind} '{name}' in vhost '/'"),
    )
}

struct Inner {
    state: Mutex<State>,
    changed: Notify,
}

/// In-process AMQP-like broker.
///
/// Exchanges fan out to every bound queue. Consumers get explicit-ack
/// deliveries bounded by the prefetch set through `basic_qos`; dropping a
/// consumer stream requeues its unacknowledged messages and removes its
/// queue when the queue is auto-delete. Clones share the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                changed: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let result = f(&mut self.state());
        self.inner.changed.notify_waiters();
        result
    }

    /// Make every later operation on `resource` fail.
    pub fn fail_on(&self, resource: impl Into<String>) {
        self.state().failures.insert(resource.into());
    }

    /// Close the broker: consumer streams end and every operation fails.
    pub fn close(&self) {
        self.state().closed = true;
        self.inner.changed.notify_waiters();
    }

    pub fn has_exchange(&self, exchange: &str) -> bool {
        self.state().exchanges.contains_key(exchange)
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.state().queues.contains_key(queue)
    }

    pub fn queue_options(&self, queue: &str) -> Option<QueueOptions> {
        self.state().queues.get(queue).map(|q| q.options)
    }

    /// Queues bound to `exchange`.
    pub fn bindings(&self, exchange: &str) -> Vec<String> {
        self.state()
            .exchanges
            .get(exchange)
            .map(|e| e.bindings.clone())
            .unwrap_or_default()
    }

    /// Messages in `queue`, ready or delivered but not yet acknowledged.
    pub fn queue_depth(&self, queue: &str) -> usize {
        let state = self.state();
        let ready = state.queues.get(queue).map_or(0, |q| q.ready.len());
        let unacked = state.unacked.values().filter(|u| u.queue == queue).count();
        ready + unacked
    }

    pub fn unacked_count(&self) -> usize {
        self.state().unacked.len()
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.consumers)
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }
}

#[async_trait]
impl BrokerChannel for MemoryBroker {
    async fn exchange_declare(&self, exchange: &str, options: ExchangeOptions) -> Result<()> {
        self.mutate(|state| {
            state.guard("exchange_declare", exchange)?;
            if options.passive {
                return match state.exchanges.contains_key(exchange) {
                    true => Ok(()),
                    false => Err(not_found("exchange_declare", "exchange", exchange)),
                };
            }
            state.exchanges.entry(exchange.to_string()).or_default();
            Ok(())
        })
    }

    async fn exchange_delete(&self, exchange: &str) -> Result<()> {
        self.mutate(|state| {
            state.guard("exchange_delete", exchange)?;
            state.exchanges.remove(exchange);
            Ok(())
        })
    }

    async fn queue_declare(&self, queue: &str, options: QueueOptions) -> Result<String> {
        self.mutate(|state| {
            state.guard("queue_declare", queue)?;
            if options.passive {
                return match state.queues.contains_key(queue) {
                    true => Ok(queue.to_string()),
                    false => Err(not_found("queue_declare", "queue", queue)),
                };
            }

            let name = if queue.is_empty() {
                state.next_anonymous += 1;
                format!("amq.gen-{}", state.next_anonymous)
            } else {
                queue.to_string()
            };
            state.queues.entry(name.clone()).or_insert_with(|| Queue {
                options,
                ready: VecDeque::new(),
                consumers: 0,
            });
            Ok(name)
        })
    }

    async fn queue_delete(&self, queue: &str) -> Result<()> {
        self.mutate(|state| {
            state.guard("queue_delete", queue)?;
            state.remove_queue(queue);
            Ok(())
        })
    }

    async fn queue_bind(&self, queue: &str, exchange: &str) -> Result<()> {
        self.mutate(|state| {
            state.guard("queue_bind", queue)?;
            state.guard("queue_bind", exchange)?;
            if !state.queues.contains_key(queue) {
                return Err(not_found("queue_bind", "queue", queue));
            }
            let bound = state
                .exchanges
                .get_mut(exchange)
                .ok_or_else(|| not_found("queue_bind", "exchange", exchange))?;
            if !bound.bindings.iter().any(|b| b == queue) {
                bound.bindings.push(queue.to_string());
            }
            Ok(())
        })
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        body: &[u8],
        properties: MessageProperties,
    ) -> Result<()> {
        self.mutate(|state| {
            state.guard("basic_publish", exchange)?;
            let bindings = state
                .exchanges
                .get(exchange)
                .ok_or_else(|| not_found("basic_publish", "exchange", exchange))?
                .bindings
                .clone();

            let message = Message {
                body: body.to_vec(),
                event_name: properties.event_name.clone(),
            };
            for queue in &bindings {
                if let Some(queue) = state.queues.get_mut(queue) {
                    queue.ready.push_back(message.clone());
                }
            }
            debug!(exchange, queues = bindings.len(), "message routed");

            state.published.push(PublishedMessage {
                exchange: exchange.to_string(),
                body: message.body,
                event_name: message.event_name,
                persistent: properties.persistent,
            });
            Ok(())
        })
    }

    async fn basic_qos(&self, prefetch_count: u16) -> Result<()> {
        self.mutate(|state| {
            state.guard("basic_qos", "channel")?;
            state.prefetch = (prefetch_count > 0).then_some(prefetch_count);
            Ok(())
        })
    }

    async fn basic_consume(&self, queue: &str) -> Result<BoxStream<'static, Result<Delivery>>> {
        let cursor = self.mutate(|state| {
            state.guard("basic_consume", queue)?;
            let prefetch = state.prefetch;
            let consumed = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| not_found("basic_consume", "queue", queue))?;
            consumed.consumers += 1;
            state.next_consumer += 1;

            Ok(Cursor {
                broker: self.clone(),
                queue: queue.to_string(),
                consumer: state.next_consumer,
                prefetch,
            })
        })?;

        Ok(stream::unfold(cursor, |cursor| async move {
            let delivery = cursor.next_delivery().await?;
            Some((Ok(delivery), cursor))
        })
        .boxed())
    }

    async fn basic_ack(&self, delivery_tag: u64) -> Result<()> {
        self.mutate(|state| {
            state.guard("basic_ack", "channel")?;
            state.unacked.remove(&delivery_tag).map(|_| ()).ok_or_else(|| {
                BusError::broker(
                    "basic_ack",
                    delivery_tag.to_string(),
                    format!("PRECONDITION_FAILED - unknown delivery tag {delivery_tag}"),
                )
            })
        })
    }
}

/// One consumer's position on a queue.
struct Cursor {
    broker: MemoryBroker,
    queue: String,
    consumer: u64,
    prefetch: Option<u16>,
}

impl Cursor {
    /// Wait for the next deliverable message; `None` once the broker is
    /// closed or the queue is gone.
    async fn next_delivery(&self) -> Option<Delivery> {
        loop {
            let changed = self.broker.inner.changed.notified();
            {
                let mut state = self.broker.state();
                if state.closed {
                    return None;
                }
                let limited = self
                    .prefetch
                    .is_some_and(|limit| state.in_flight(self.consumer) >= usize::from(limit));

                if !limited {
                    let message = state.queues.get_mut(&self.queue)?.ready.pop_front();
                    if let Some(message) = message {
                        state.next_tag += 1;
                        let delivery_tag = state.next_tag;
                        let delivery = Delivery {
                            delivery_tag,
                            body: message.body.clone(),
                            event_name: message.event_name.clone(),
                        };
                        state.unacked.insert(
                            delivery_tag,
                            Unacked {
                                queue: self.queue.clone(),
                                consumer: self.consumer,
                                message,
                            },
                        );
                        return Some(delivery);
                    }
                } else if !state.queues.contains_key(&self.queue) {
                    return None;
                }
            }
            changed.await;
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let mut state = self.broker.state();

        let tags: Vec<u64> = state
            .unacked
            .iter()
            .filter(|(_, u)| u.consumer == self.consumer)
            .map(|(tag, _)| *tag)
            .collect();
        let mut requeued: Vec<Message> = tags
            .iter()
            .filter_map(|tag| state.unacked.remove(tag))
            .map(|u| u.message)
            .collect();

        let mut remove = false;
        if let Some(queue) = state.queues.get_mut(&self.queue) {
            queue.consumers = queue.consumers.saturating_sub(1);
            while let Some(message) = requeued.pop() {
                queue.ready.push_front(message);
            }
            remove = queue.options.auto_delete && queue.consumers == 0;
        }
        if remove {
            state.remove_queue(&self.queue);
        }

        drop(state);
        self.broker.inner.changed.notify_waiters();
    }
}
