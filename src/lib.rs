//! MessagePack-RPC over TCP with per-call connections.
//!
//! This library implements the msgpack-rpc wire protocol: a [`Client`]
//! that issues requests and notifications, and a [`Server`] that routes
//! incoming messages to registered handlers and replies to requests.
//!
//! Every client call opens its own TCP connection, sends exactly one
//! message, and (for requests) reads exactly one response before closing.
//! A server connection may carry any number of sequential messages;
//! framing is delegated to the streaming msgpack decoder.
//!

// Import all sub modules once...
mod client;
mod codec;
mod config;
mod error;
mod protocol;
mod server;
mod transport;

mod macros;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::Client;
pub use server::{HandlerOutcome, Server, ServerHandle};

pub use codec::MessageCodec;
pub use config::{ClientConfig, CodecOptions, DecodeOptions, EncodeOptions};
pub use error::{Error, Result};
pub use protocol::{Message, MsgIdGenerator};
pub use transport::ConnectionEvent;

pub use rmpv::Value;
