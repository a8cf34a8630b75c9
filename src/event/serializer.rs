//! Wire encodings for events.
//!
//! Events cross process boundaries as opaque bytes. Two encodings are
//! provided: a self-describing JSON document (the default) and a compact
//! bitcode form. Neither attempts to serialize arbitrary object graphs; the
//! event payload is carried as bytes and interpreted by the application.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::Event;
use crate::error::Result;

/// Encodes events to bytes and back.
pub trait Serializer: Send + Sync {
    fn encode(&self, event: &Event) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Event>;
}

/// JSON wire format:
///
/// ```json
/// {
///   "event_name": "OrderPlaced",
///   "event": {
///     "id": "evt-1",
///     "event_type": "shop::orders::OrderPlaced",
///     "name": null,
///     "payload": "<base64>",
///     "metadata": [["correlation-id", "abc"]]
///   }
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

#[derive(Serialize, Deserialize)]
struct JsonEnvelope {
    event_name: String,
    event: JsonEvent,
}

#[derive(Serialize, Deserialize)]
struct JsonEvent {
    id: String,
    event_type: String,
    #[serde(default)]
    name: Option<String>,
    payload: String,
    #[serde(default)]
    metadata: Option<Vec<(String, String)>>,
}

impl Serializer for JsonSerializer {
    fn encode(&self, event: &Event) -> Result<Vec<u8>> {
        let envelope = JsonEnvelope {
            event_name: event.display_name().to_string(),
            event: JsonEvent {
                id: event.id.clone(),
                event_type: event.event_type.clone(),
                name: event.name.clone(),
                payload: STANDARD.encode(&event.payload),
                metadata: event.metadata.clone(),
            },
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Event> {
        let envelope: JsonEnvelope = serde_json::from_slice(bytes)?;
        let JsonEvent {
            id,
            event_type,
            name,
            payload,
            metadata,
        } = envelope.event;

        Ok(Event {
            id,
            event_type,
            name,
            payload: STANDARD.decode(payload)?,
            metadata,
        })
    }
}

/// Compact binary wire format using bitcode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitcodeSerializer;

impl Serializer for BitcodeSerializer {
    fn encode(&self, event: &Event) -> Result<Vec<u8>> {
        Ok(bitcode::serialize(event)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Event> {
        Ok(bitcode::deserialize(bytes)?)
    }
}
