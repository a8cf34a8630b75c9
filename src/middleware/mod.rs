//! Middleware: interceptors wrapping every dispatch.
//!
//! A middleware receives the event and a [`Next`] continuation. Calling
//! `next.run(event)` continues the chain; not calling it short-circuits
//! everything configured after it.
//!
//! ## Example
//!
//! ```ignore
//! struct Audit;
//!
//! #[async_trait]
//! impl Middleware for Audit {
//!     async fn dispatch(&self, event: Event, next: Next) -> Result<()> {
//!         tracing::info!(event = %event.event_type, "before");
//!         next.run(event).await?;
//!         tracing::info!("after");
//!         Ok(())
//!     }
//! }
//! ```

mod chain;
mod publish;
mod registry;

pub use chain::Distribution;
pub(crate) use chain::compose;
pub use publish::AsyncPublishMiddleware;
pub use registry::{MiddlewareRegistry, ASYNC_MIDDLEWARE};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};

use crate::error::Result;
use crate::event::Event;

type Continuation = dyn Fn(Event) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// The rest of the chain, as seen from one middleware.
#[derive(Clone)]
pub struct Next {
    inner: Arc<Continuation>,
}

impl Next {
    /// The end of every chain: resolves immediately.
    pub fn terminal() -> Self {
        Self::from_fn(|_event| async { Ok(()) })
    }

    pub(crate) fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |event| f(event).boxed()),
        }
    }

    /// Continue the chain with `event`.
    pub fn run(&self, event: Event) -> BoxFuture<'static, Result<()>> {
        (self.inner)(event)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// Identity of a middleware, for introspection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareDescriptor {
    pub handler: String,
    pub method: String,
}

impl MiddlewareDescriptor {
    pub fn new(handler: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MiddlewareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.handler, self.method)
    }
}

/// An interceptor in the dispatch chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn dispatch(&self, event: Event, next: Next) -> Result<()>;

    fn descriptor(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor::new(std::any::type_name::<Self>(), "dispatch")
    }
}

type Handler = dyn Fn(Event, Next) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Binds a plain async function to the [`Middleware`] interface under a
/// `(handler, method)` identity.
pub struct FnMiddleware {
    descriptor: MiddlewareDescriptor,
    handler: Arc<Handler>,
}

impl FnMiddleware {
    pub fn new<F, Fut>(handler: impl Into<String>, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Event, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            descriptor: MiddlewareDescriptor::new(handler, method),
            handler: Arc::new(move |event, next| f(event, next).boxed()),
        }
    }
}

#[async_trait]
impl Middleware for FnMiddleware {
    async fn dispatch(&self, event: Event, next: Next) -> Result<()> {
        (self.handler)(event, next).await
    }

    fn descriptor(&self) -> MiddlewareDescriptor {
        self.descriptor.clone()
    }
}
