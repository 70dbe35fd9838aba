//! # Error Taxonomy
//!
//! Purpose: One error type shared by the framing core and the channel so
//! callers can match on failure classes without string inspection.
//!
//! ## Design Principles
//! 1. **Fail Fast**: Transport errors surface unchanged; nothing is retried.
//! 2. **Precise Classes**: Connection, I/O, truncation and lifecycle misuse are
//!    distinct variants.

use thiserror::Error;

/// Result type for channel and framing operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors surfaced by the delimited message channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Host name could not be resolved to any socket address.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Every resolved address refused or timed out the TCP connect.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Read, write, flush or shutdown failed on an open channel.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input ended before the delimiter arrived.
    #[error("stream ended after {received} bytes without a delimiter")]
    Truncated { received: usize },

    /// A payload, or the bytes buffered while waiting for its delimiter,
    /// exceeded the configured limit.
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },

    /// The channel was already closed.
    #[error("channel already closed")]
    AlreadyClosed,

    /// The channel has not been opened yet.
    #[error("channel is not open")]
    NotOpen,

    /// `open` was called on a channel that is already open.
    #[error("channel is already open")]
    AlreadyOpen,

    /// A read was requested with a zero-sized chunk buffer.
    #[error("buffer size must be greater than zero")]
    InvalidBufferSize,

    /// The delimiter contains characters the channel encoding cannot
    /// represent, so it can never appear on the wire.
    #[error("delimiter {delimiter:?} cannot be represented in {encoding}")]
    UnencodableDelimiter {
        delimiter: String,
        encoding: &'static str,
    },

    /// A read was requested with an empty delimiter.
    #[error("delimiter must not be empty")]
    EmptyDelimiter,
}

impl ChannelError {
    /// Returns true for failures raised while establishing the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ChannelError::Resolve { .. } | ChannelError::Connect { .. })
    }
}
