//! Events carried by the bus.
//!
//! An [`Event`] is an immutable value with a stable type identity
//! (`event_type`, a `::`-separated path such as `shop::orders::OrderPlaced`)
//! and an opaque payload. The identity drives routing; the payload is only
//! interpreted by the application.

mod serializer;

pub use serializer::{BitcodeSerializer, JsonSerializer, Serializer};

use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};

/// An event dispatched through the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: String,
    /// Type identity (e.g., "shop::orders::OrderPlaced")
    pub event_type: String,
    /// Logical event name, when dispatched through the named variant
    pub name: Option<String>,
    /// Serialized payload (typically bitcode or JSON)
    pub payload: Vec<u8>,
    /// Optional metadata (headers, correlation IDs, etc.)
    pub metadata: Option<Vec<(String, String)>>,
}

impl Event {
    /// Create a new event with the given type and payload.
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            name: None,
            payload,
            metadata: None,
        }
    }

    /// Create an event with bitcode-serialized payload.
    pub fn encode<T: Serialize>(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(id, event_type, bytes))
    }

    /// Create an event from a domain value, using its Rust type path as the
    /// type identity.
    ///
    /// `std::any::type_name` output is not guaranteed to be stable across
    /// compiler versions. Route such events by short name, or use
    /// [`Event::encode`] with an explicit type when the full identity has to
    /// match a routing entry or a peer process.
    pub fn of<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self> {
        Self::encode(id, std::any::type_name::<T>(), value)
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(bitcode::deserialize(&self.payload)?)
    }

    /// Create an event with a string payload.
    pub fn with_string_payload(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(id, event_type, payload.into().into_bytes())
    }

    /// Attach a logical event name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add metadata to the event.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Last path segment of the type identity.
    ///
    /// `shop::orders::OrderPlaced` becomes `OrderPlaced`. Generic arguments
    /// are not treated as path segments.
    pub fn short_name(&self) -> &str {
        short_name(&self.event_type)
    }

    /// Logical name if one was given, otherwise the type identity.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.event_type)
    }

    /// Reject values that cannot be routed or dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.event_type.trim().is_empty() {
            return Err(BusError::InvalidEvent);
        }
        Ok(())
    }
}

pub(crate) fn short_name(type_identity: &str) -> &str {
    let base = match type_identity.find('<') {
        Some(generic_start) => &type_identity[..generic_start],
        None => type_identity,
    };
    base.rsplit("::").next().unwrap_or(base)
}

/// Wraps a domain event under a logical event name.
///
/// Routing always looks through the envelope: converting it into an
/// [`Event`] keeps the inner event's type identity and records the
/// envelope's name as the logical name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainEventEnvelope {
    event_name: String,
    domain_event: Event,
}

impl DomainEventEnvelope {
    pub fn new(event_name: impl Into<String>, domain_event: Event) -> Self {
        Self {
            event_name: event_name.into(),
            domain_event,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn domain_event(&self) -> &Event {
        &self.domain_event
    }
}

impl From<DomainEventEnvelope> for Event {
    fn from(envelope: DomainEventEnvelope) -> Self {
        envelope.domain_event.named(envelope.event_name)
    }
}
