pub mod broker;
mod bus;
pub mod commands;
mod config;
mod error;
mod event;
mod middleware;
pub mod progress;
mod router;
pub mod transport;

pub use bus::{Bus, BusBuilder, Buses, LocalListeners};
pub use config::{AdapterKind, AmqpConfig, AsyncAdapterConfig, BusConfig};
pub use error::{BusError, Result};
pub use event::{BitcodeSerializer, DomainEventEnvelope, Event, JsonSerializer, Serializer};
pub use middleware::{
    AsyncPublishMiddleware, Distribution, FnMiddleware, Middleware, MiddlewareDescriptor,
    MiddlewareRegistry, Next, ASYNC_MIDDLEWARE,
};
pub use router::{Router, ALL_ROUTE, OTHERS_ROUTE};
pub use transport::{AmqpTransport, ExchangeSpec, InMemoryTransport, Transport};

// Re-exported so middleware can be written without depending on async-trait directly
pub use async_trait::async_trait;
