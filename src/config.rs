//! Public, transport-facing configuration.
//!
//! Codec options are split by direction and forwarded opaquely to the
//! codec adapter; both roles accept the same [`CodecOptions`] so that a
//! client and a server can be configured symmetrically.

use std::time::Duration;

/// Options applied when encoding outgoing messages.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Bytes reserved in the write buffer before each message is encoded.
    pub reserve: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { reserve: 128 }
    }
}

/// Options applied when decoding incoming messages.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Maximum bytes buffered for a single incomplete message.
    ///
    /// Incoming messages are buffered until the streaming decoder can
    /// produce a complete unit; a peer whose message grows past this cap
    /// is a protocol violation. Bounds memory on a broken or hostile peer.
    pub max_message_len: usize,
}

impl Default for DecodeOptions {
    /// 16 MiB, far above anything the protocol's fixed-arity messages
    /// produce in normal use.
    fn default() -> Self {
        Self {
            max_message_len: 16 * 1024 * 1024,
        }
    }
}

/// Independent encode-direction and decode-direction codec configuration.
///
/// # Example
///
/// ```
/// use mprpc::{CodecOptions, DecodeOptions};
///
/// let options = CodecOptions::default().with_decode(DecodeOptions {
///     max_message_len: 64 * 1024,
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodecOptions {
    /// Encode-direction options.
    pub encode: EncodeOptions,
    /// Decode-direction options.
    pub decode: DecodeOptions,
}

impl CodecOptions {
    /// Replace the encode-direction options.
    pub fn with_encode(mut self, encode: EncodeOptions) -> Self {
        self.encode = encode;
        self
    }

    /// Replace the decode-direction options.
    pub fn with_decode(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }
}

/// Client connection parameters.
///
/// # Example
///
/// ```
/// use mprpc::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new(18800)
///     .with_host("rpc.internal")
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ---
    /// Server host name or address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Per-connection timeout applied to connecting, writing, and waiting
    /// for a response. `Duration::ZERO` disables the bound.
    pub timeout: Duration,

    /// Codec configuration for this client's connections.
    pub codec: CodecOptions,
}

impl ClientConfig {
    /// Create a config for `localhost:{port}` with no timeout.
    pub fn new(port: u16) -> Self {
        Self {
            host: "localhost".to_owned(),
            port,
            timeout: Duration::ZERO,
            codec: CodecOptions::default(),
        }
    }

    /// Set the server host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the per-connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the codec options.
    pub fn with_codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }
}
