use std::sync::Arc;

use tracing::info;

use super::{Bus, LocalListeners};
use crate::config::BusConfig;
use crate::error::Result;
use crate::middleware::{AsyncPublishMiddleware, Middleware, MiddlewareRegistry};
use crate::transport::Transport;

/// The two buses a process runs.
///
/// - `event_bus` is what the application dispatches to. With a transport
///   configured it contains the publish step, and it notifies local
///   listeners only in pass-through mode.
/// - `inline_event_bus` never publishes and always notifies local
///   listeners. Consumers dispatch received events through it.
pub struct Buses {
    pub event_bus: Arc<Bus>,
    pub inline_event_bus: Arc<Bus>,
}

impl Buses {
    pub fn from_config(
        config: &BusConfig,
        registry: &MiddlewareRegistry,
        transport: Option<Arc<dyn Transport>>,
        listeners: LocalListeners,
    ) -> Result<Self> {
        // Without a transport nothing publishes, so the chain must run through.
        let pass_through = transport.is_none() || config.pass_through();
        let listeners = Arc::new(listeners);

        let publisher = transport.map(|transport| {
            info!(adapter = transport.name(), pass_through, "event bus publishes asynchronously");
            Arc::new(AsyncPublishMiddleware::new(transport, pass_through)) as Arc<dyn Middleware>
        });

        let event_bus = Bus::builder()
            .middlewares(registry.assemble(&config.middlewares, publisher, pass_through)?)
            .distribution(config.distribution)
            .shared_listeners(Arc::clone(&listeners))
            .local_dispatch(pass_through)
            .build();

        let inline_event_bus = Bus::builder()
            .middlewares(registry.assemble(&config.middlewares, None, true)?)
            .distribution(config.distribution)
            .shared_listeners(listeners)
            .local_dispatch(true)
            .build();

        Ok(Self {
            event_bus: Arc::new(event_bus),
            inline_event_bus: Arc::new(inline_event_bus),
        })
    }
}
