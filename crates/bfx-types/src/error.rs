//! Error types for the streaming client

use std::time::Duration;
use thiserror::Error;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum BfxError {
    // === Connection Errors ===
    /// Failed to establish the WebSocket connection
    #[error("Failed to connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// WebSocket read/write failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Reconnection attempts exhausted
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectExhausted { attempts: u32, reason: String },

    // === Protocol Errors ===
    /// A frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Failed to serialize an outgoing message
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Outgoing request failed local validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Application Errors (reported by the exchange) ===
    /// Exchange `error` event
    #[error("Exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// Subscription was rejected by the exchange
    #[error("Subscription rejected for {channel}: {reason}")]
    SubscriptionRejected { channel: String, reason: String },

    /// Authentication was rejected by the exchange
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    // === Desync ===
    /// Order book checksum mismatch
    #[error("Checksum mismatch for {symbol}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        symbol: String,
        expected: i32,
        computed: i32,
    },

    // === Invariant Violations ===
    /// Unknown subscription ID
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Subscription has not been acknowledged yet
    #[error("Subscription {0} is still pending")]
    SubscriptionPending(String),

    /// Operation needs an authenticated connection
    #[error("No authenticated connection")]
    NotAuthenticated,

    /// Credentials were not configured
    #[error("No credentials configured")]
    MissingCredentials,

    /// Operation on a closed connection or client
    #[error("Connection closed")]
    Closed,

    /// Internal channel was closed unexpectedly
    #[error("Internal channel closed unexpectedly")]
    ChannelClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BfxError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. } | Self::WebSocket(_)
        )
    }

    /// Returns true if this error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::WebSocket(_) | Self::ConnectionFailed { .. } | Self::ChannelClosed)
    }

    /// Returns true if the caller must resubscribe to rebuild local state
    pub fn requires_resync(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    /// Create a checksum mismatch error
    pub fn checksum_mismatch(symbol: impl Into<String>, expected: i32, computed: i32) -> Self {
        Self::ChecksumMismatch {
            symbol: symbol.into(),
            expected,
            computed,
        }
    }

    /// Create an exchange error from an `error` event
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BfxError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

/// Result type alias for client operations
pub type BfxResult<T> = Result<T, BfxError>;

/// Failure to turn a raw frame into a typed value
///
/// Decode errors are never fatal: the offending frame is logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Positional array shorter than the message's minimum arity
    #[error("{kind}: expected at least {expected} elements, got {actual}")]
    TooShort {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Element at `index` has the wrong JSON type
    #[error("{kind}: element {index} is not a valid {expected}")]
    InvalidField {
        kind: &'static str,
        index: usize,
        expected: &'static str,
    },

    /// Frame structure does not match any known message
    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),

    /// Message type not known to this client
    #[error("unknown message: {0}")]
    UnknownMessage(String),
}

impl DecodeError {
    /// Create an unexpected-shape error
    pub fn shape(detail: impl Into<String>) -> Self {
        Self::UnexpectedShape(detail.into())
    }
}
