use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::{FnMiddleware, Middleware, Next};
use crate::error::{BusError, Result};
use crate::event::Event;

/// Reserved reference marking the position of the publish step.
pub const ASYNC_MIDDLEWARE: &str = "@async";

const DEFAULT_METHOD: &str = "dispatch";

/// Named middleware available to configuration.
///
/// References are either `"Handler"` or `"Handler::method"`; a bare handler
/// resolves to its `dispatch` method.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware under an explicit reference.
    pub fn register(mut self, reference: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.entries.insert(reference.into(), middleware);
        self
    }

    /// Register a function as `handler::method`.
    pub fn register_fn<F, Fut>(self, handler: &str, method: &str, f: F) -> Self
    where
        F: Fn(Event, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let reference = format!("{handler}::{method}");
        self.register(reference, Arc::new(FnMiddleware::new(handler, method, f)))
    }

    /// Look up a reference, failing fast when nothing is bound to it.
    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn Middleware>> {
        self.entries
            .get(reference)
            .or_else(|| self.entries.get(&format!("{reference}::{DEFAULT_METHOD}")))
            .cloned()
            .ok_or_else(|| BusError::InvalidMiddleware(reference.to_string()))
    }

    /// Build the ordered middleware list for a bus.
    ///
    /// `publisher` is the publish step when the bus is asynchronous. It sits
    /// where [`ASYNC_MIDDLEWARE`] appears, or first when the marker is absent.
    /// A publish step that is not pass-through ends the list.
    pub fn assemble(
        &self,
        references: &[String],
        publisher: Option<Arc<dyn Middleware>>,
        pass_through: bool,
    ) -> Result<Vec<Arc<dyn Middleware>>> {
        let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
        let marker_present = references.iter().any(|r| r == ASYNC_MIDDLEWARE);

        if let Some(publisher) = publisher.as_ref().filter(|_| !marker_present) {
            chain.push(Arc::clone(publisher));
            if !pass_through {
                return Ok(chain);
            }
        }

        for reference in references {
            if reference == ASYNC_MIDDLEWARE {
                if let Some(publisher) = &publisher {
                    chain.push(Arc::clone(publisher));
                    if !pass_through {
                        return Ok(chain);
                    }
                }
                continue;
            }
            chain.push(self.resolve(reference)?);
        }

        Ok(chain)
    }
}
