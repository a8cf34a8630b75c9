use std::sync::Arc;

use async_trait::async_trait;

use super::{Middleware, MiddlewareDescriptor, Next};
use crate::error::Result;
use crate::event::Event;
use crate::transport::Transport;

/// Hands every event to a [`Transport`].
///
/// When `pass_through` is off the chain stops here once the publish
/// succeeds; later middleware and local listeners never see the event.
pub struct AsyncPublishMiddleware {
    transport: Arc<dyn Transport>,
    pass_through: bool,
}

impl AsyncPublishMiddleware {
    pub fn new(transport: Arc<dyn Transport>, pass_through: bool) -> Self {
        Self {
            transport,
            pass_through,
        }
    }

    pub fn pass_through(&self) -> bool {
        self.pass_through
    }
}

#[async_trait]
impl Middleware for AsyncPublishMiddleware {
    async fn dispatch(&self, event: Event, next: Next) -> Result<()> {
        self.transport.publish(&event).await?;

        if self.pass_through {
            next.run(event).await?;
        }
        Ok(())
    }

    fn descriptor(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor::new("AsyncPublishMiddleware", "dispatch")
    }
}
