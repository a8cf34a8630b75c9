//! Event bus: middleware chain plus optional local fan-out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Bus                                  │
//! │  dispatch(event) → middleware 1 → middleware 2 → … → end    │
//! │                  → local listeners (when enabled)           │
//! └─────────────────────────────────────────────────────────────┘
//!                            │  AsyncPublishMiddleware
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport (Router inside)                    │
//! │  publish / create / drop / check / subscribe                │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────────┐            ┌─────────────────────┐
//! │  AmqpTransport      │            │  InMemoryTransport  │
//! │  (BrokerChannel)    │            │  (records only)     │
//! └─────────────────────┘            └─────────────────────┘
//! ```

mod buses;
mod dispatcher;
mod listeners;

pub use buses::Buses;
pub use dispatcher::{Bus, BusBuilder};
pub use listeners::LocalListeners;
