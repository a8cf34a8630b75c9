//! Bus: runs the middleware chain for every dispatched event.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::listeners::LocalListeners;
use crate::error::Result;
use crate::event::Event;
use crate::middleware::{compose, Distribution, Middleware, MiddlewareDescriptor, Next};

/// Event bus.
///
/// The middleware chain is composed once at construction and never changes
/// afterwards. Each dispatch owns its own continuation graph, so concurrent
/// dispatches do not contend.
///
/// ## Example
///
/// ```ignore
/// let bus = Bus::builder()
///     .middleware(Arc::new(Audit))
///     .middleware(Arc::new(AsyncPublishMiddleware::new(transport, true)))
///     .distribution(Distribution::NextTick)
///     .listener("OrderPlaced", |event| async move { project(event).await })
///     .build();
///
/// bus.dispatch(Event::of("evt-1", &OrderPlaced { .. })?).await?;
/// ```
pub struct Bus {
    chain: Next,
    middleware: Vec<MiddlewareDescriptor>,
    distribution: Distribution,
    listeners: Arc<LocalListeners>,
    local_dispatch: bool,
}

impl Bus {
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }

    /// Dispatch an event through the chain.
    ///
    /// Invalid events are rejected before any middleware runs. When local
    /// dispatch is enabled, listeners are notified after the chain succeeds.
    pub async fn dispatch(&self, event: Event) -> Result<()> {
        event.validate()?;
        debug!(event_type = %event.event_type, id = %event.id, "dispatching event");

        if self.local_dispatch {
            self.chain.run(event.clone()).await?;
            self.listeners.emit(&event).await
        } else {
            self.chain.run(event).await
        }
    }

    /// Dispatch an event under a logical name.
    pub async fn dispatch_named(&self, name: impl Into<String>, event: Event) -> Result<()> {
        self.dispatch(event.named(name)).await
    }

    /// Configured middleware, in execution order.
    pub fn middleware_list(&self) -> &[MiddlewareDescriptor] {
        &self.middleware
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn local_dispatch(&self) -> bool {
        self.local_dispatch
    }
}

/// Builder for [`Bus`].
#[derive(Default)]
pub struct BusBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
    distribution: Distribution,
    listeners: LocalListeners,
    shared_listeners: Option<Arc<LocalListeners>>,
    local_dispatch: bool,
}

impl BusBuilder {
    /// Append a middleware; the first appended runs first.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn middlewares(mut self, middleware: impl IntoIterator<Item = Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Register a local listener. Enables local dispatch.
    pub fn listener<F, Fut>(mut self, key: impl Into<String>, listener: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.listeners.on(key, listener);
        self.local_dispatch = true;
        self
    }

    /// Use a listener set shared with other buses. Listeners registered on
    /// this builder with [`BusBuilder::listener`] run after the shared ones.
    pub fn shared_listeners(mut self, listeners: Arc<LocalListeners>) -> Self {
        self.shared_listeners = Some(listeners);
        self
    }

    pub fn local_dispatch(mut self, enabled: bool) -> Self {
        self.local_dispatch = enabled;
        self
    }

    pub fn build(self) -> Bus {
        let descriptors = self.middleware.iter().map(|m| m.descriptor()).collect();
        let chain = compose(&self.middleware, self.distribution);
        let listeners = match self.shared_listeners {
            Some(shared) if self.listeners.is_empty() => shared,
            Some(shared) => {
                let mut merged = LocalListeners::clone(&shared);
                merged.extend(self.listeners);
                Arc::new(merged)
            }
            None => Arc::new(self.listeners),
        };

        Bus {
            chain,
            middleware: descriptors,
            distribution: self.distribution,
            listeners,
            local_dispatch: self.local_dispatch,
        }
    }
}
