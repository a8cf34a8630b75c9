use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Middleware, Next};

/// How each middleware step is scheduled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Middleware invoke each other directly; no scheduling boundary.
    #[default]
    Inline,
    /// Every step yields to the scheduler before running.
    NextTick,
}

/// Compose `middleware` into a single continuation.
///
/// Walks the list in reverse so the first configured middleware runs first
/// and sees all later ones as its `next`.
pub(crate) fn compose(middleware: &[Arc<dyn Middleware>], distribution: Distribution) -> Next {
    middleware
        .iter()
        .rev()
        .fold(Next::terminal(), |next, middleware| {
            let middleware = Arc::clone(middleware);
            Next::from_fn(move |event| {
                let middleware = Arc::clone(&middleware);
                let next = next.clone();
                async move {
                    if distribution == Distribution::NextTick {
                        tokio::task::yield_now().await;
                    }
                    middleware.dispatch(event, next).await
                }
            })
        })
}
