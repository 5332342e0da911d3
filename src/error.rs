use rmpv::Value;
use thiserror::Error;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum Error {
    /// A decoded message was not the message the protocol expects here.
    ///
    /// Raised when a reply is not a response message, when a message array
    /// has the wrong arity or field types, or when an incomplete message
    /// grows past the configured decode limit. Fatal for the message (and,
    /// on the server, for that connection's processing).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Error payload supplied by the remote request handler.
    ///
    /// Carries the exact `error` field of the response message.
    #[error("remote error: {0}")]
    Remote(Value),

    /// The per-connection timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The connection closed before a response arrived.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// Connection-level I/O failure (refusal, reset, shutdown).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Incoming bytes could not be decoded as msgpack.
    #[error("decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// A message could not be encoded as msgpack.
    #[error("encode error: {0}")]
    Encode(#[from] rmpv::encode::Error),

    /// Conversion between typed values and msgpack values failed.
    #[error("value conversion failed: {0}")]
    Convert(String),
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, Error>;
