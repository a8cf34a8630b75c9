use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::error::Result;
use crate::event::Event;

type Listener = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// In-process listeners notified after a dispatch chain succeeds.
///
/// Listeners are keyed by full type identity or by short name. An event
/// reaches the listeners of both keys, full identity first, each in
/// registration order.
#[derive(Default, Clone)]
pub struct LocalListeners {
    listeners: HashMap<String, Vec<Listener>>,
}

impl LocalListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(&mut self, key: impl Into<String>, listener: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.listeners
            .entry(key.into())
            .or_default()
            .push(Arc::new(move |event| listener(event).boxed()));
    }

    /// Append every listener of `other`, after the ones already registered
    /// under the same key.
    pub fn extend(&mut self, other: LocalListeners) {
        for (key, listeners) in other.listeners {
            self.listeners.entry(key).or_default().extend(listeners);
        }
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every matching listener in turn; the first failure stops the
    /// fan-out and is returned.
    pub async fn emit(&self, event: &Event) -> Result<()> {
        let mut keys = vec![event.event_type.as_str()];
        if event.short_name() != event.event_type {
            keys.push(event.short_name());
        }

        for key in keys {
            let Some(listeners) = self.listeners.get(key) else {
                continue;
            };
            for listener in listeners {
                listener(event.clone()).await?;
            }
        }
        Ok(())
    }
}
