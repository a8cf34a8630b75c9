use thiserror::Error;

/// Errors raised by the bus, its router and its transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Dispatch was called with a value that carries no type identity.
    #[error("invalid event: an event must carry a non-empty type identity")]
    InvalidEvent,

    /// An exchange alias has no configured physical exchange name.
    #[error("Exchange with name {0} is not configured")]
    InvalidExchange(String),

    /// The router was built without any configured exchange.
    #[error("Empty exchange list. You should configure, at least, one")]
    EmptyExchangeList,

    /// The transport structurally cannot perform the requested operation.
    #[error("operation not supported by {0}")]
    UnsupportedOperation(String),

    /// A broker protocol call failed.
    #[error("broker {operation} on {resource} failed: {reason}")]
    BrokerOperationFailure {
        operation: &'static str,
        resource: String,
        reason: String,
    },

    /// A user-supplied middleware or listener rejected the event.
    #[error("middleware failed: {0}")]
    MiddlewareFailure(String),

    /// A configured middleware reference could not be resolved.
    #[error("invalid middleware: {0}")]
    InvalidMiddleware(String),

    /// Encoding or decoding an event failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BusError {
    pub(crate) fn broker(
        operation: &'static str,
        resource: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        BusError::BrokerOperationFailure {
            operation,
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// The human-readable reason, without the operation prefix for broker
    /// failures. Used in per-resource progress lines.
    pub fn reason(&self) -> String {
        match self {
            BusError::BrokerOperationFailure { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<bitcode::Error> for BusError {
    fn from(err: bitcode::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for BusError {
    fn from(err: base64::DecodeError) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BusError {
    fn from(err: toml::de::Error) -> Self {
        BusError::Config(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BusError>;
