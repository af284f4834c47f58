//! Transport error types.

use std::time::Duration;
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::jsonrpc::{JsonRpcError, MessageId};

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
///
/// Errors are `Clone` so the same failure can be returned to a caller and
/// broadcast on the transport's event channel.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The stream closed before the session handshake completed.
    #[error("Connection closed before session established: {0}")]
    ConnectionClosed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connection establishment (stream open plus session handshake) timed out.
    #[error(
        "Connection timed out after {timeout:?} for operation: {operation}. \
         If this is expected, increase the timeout with \
         `TimeoutConfig {{ connect: Duration::from_secs({}) }}`",
        timeout.as_secs().max(1) * 2
    )]
    ConnectionTimeout {
        /// The operation that timed out
        operation: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The transport was explicitly closed and cannot be reused.
    #[error("Transport is closed")]
    Closed,

    /// Failed to send a message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The message endpoint answered with a non-success status.
    #[error("Server error {status}: {body}")]
    ServerError {
        /// HTTP status code returned by the message endpoint
        status: u16,
        /// Response body, decoded lossily as UTF-8
        body: String,
    },

    /// A request did not receive its response in time.
    #[error("Request {id} timed out after {timeout:?}")]
    RequestTimeout {
        /// Identifier of the request that timed out
        id: MessageId,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The transport disconnected while the request was pending.
    #[error("Transport disconnected")]
    Disconnected,

    /// `request()` was called with a message that has no id.
    #[error("Request message must have an id")]
    MissingRequestId,

    /// A request with the same id is already awaiting its response.
    #[error("Duplicate request id: {0}")]
    DuplicateRequestId(MessageId),

    /// The server answered a request with a JSON-RPC error object.
    #[error("{}", .0.message)]
    Rpc(JsonRpcError),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A protocol-level error occurred.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// Request size exceeds the configured maximum limit.
    #[error(
        "Request size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase the limit with \
         `LimitsConfig {{ max_request_size: Some({}) }}` or use `LimitsConfig::unlimited()`.",
        size
    )]
    RequestTooLarge {
        /// The actual size of the request in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },

    /// Response size exceeds the configured maximum limit.
    #[error(
        "Response size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase the limit with \
         `LimitsConfig {{ max_response_size: Some({}) }}` or use `LimitsConfig::unlimited()`.",
        size
    )]
    ResponseTooLarge {
        /// The actual size of the response in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },
}

impl TransportError {
    /// Returns `true` for failures raised while establishing a session.
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionClosed(_)
                | Self::ConnectionTimeout { .. }
                | Self::Closed
        )
    }

    /// Returns `true` for failures raised while correlating a request with its response.
    pub fn is_correlation_error(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::Disconnected | Self::Rpc(_)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<JsonRpcError> for TransportError {
    fn from(err: JsonRpcError) -> Self {
        Self::Rpc(err)
    }
}

/// Validates that a request message size does not exceed the configured limit.
///
/// # Returns
///
/// `Ok(())` if the size is within limits or no limit is set, otherwise `Err(TransportError::RequestTooLarge)`
pub fn validate_request_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max_size) = limits.max_request_size
        && size > max_size
    {
        return Err(TransportError::RequestTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Validates that a response message size does not exceed the configured limit.
///
/// # Returns
///
/// `Ok(())` if the size is within limits or no limit is set, otherwise `Err(TransportError::ResponseTooLarge)`
pub fn validate_response_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max_size) = limits.max_response_size
        && size > max_size
    {
        return Err(TransportError::ResponseTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}
