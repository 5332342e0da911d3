// src/transport.rs

//! Per-call TCP transport.
//!
//! The client opens one connection per call. This module owns that
//! lifecycle: connecting with the configured timeout, framing the socket
//! with the message codec, and republishing connection events on the
//! client's event channel so callers can observe low-level transport
//! behavior independent of a call's logical outcome.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;
use tokio_util::codec::Framed;

use crate::codec::MessageCodec;
use crate::config::{ClientConfig, CodecOptions};
use crate::error::{Error, Result};
use crate::log_debug;
use crate::protocol::Message;

/// Connection lifecycle event, republished on
/// [`Client::events`](crate::Client::events).
///
/// These mirror the underlying socket's lifecycle. A successful call
/// produces `Connect`, a `Drain` per flushed write, then `Close`, with
/// `End`, `Timeout`, and `Error` interleaved as the connection dictates.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection to the server was established.
    Connect(SocketAddr),
    /// The server closed its side of the connection.
    End,
    /// The per-connection timeout elapsed.
    Timeout,
    /// All buffered outgoing bytes were flushed to the socket.
    Drain,
    /// The connection failed.
    Error(String),
    /// The connection was closed on this side.
    Close,
}

pub(crate) type Connection = Framed<TcpStream, MessageCodec>;

/// Opens per-call connections and emits their lifecycle events.
pub(crate) struct Connector {
    // ---
    host: String,
    port: u16,
    timeout: Duration,
    codec: CodecOptions,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Connector {
    // ---
    pub(crate) fn new(config: ClientConfig, events: broadcast::Sender<ConnectionEvent>) -> Self {
        // ---
        Self {
            host: config.host,
            port: config.port,
            timeout: config.timeout,
            codec: config.codec,
            events,
        }
    }

    /// Open a fresh connection for one call.
    pub(crate) async fn open(&self) -> Result<Connection> {
        // ---
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match self.bounded(connect).await? {
            Ok(stream) => stream,
            Err(err) => {
                self.emit(ConnectionEvent::Error(err.to_string()));
                return Err(err.into());
            }
        };

        if let Ok(peer) = stream.peer_addr() {
            self.emit(ConnectionEvent::Connect(peer));
        }

        Ok(Framed::new(stream, MessageCodec::new(self.codec.clone())))
    }

    /// Write one message and flush it.
    pub(crate) async fn send(&self, conn: &mut Connection, message: Message) -> Result<()> {
        // ---
        match self.bounded(conn.send(message)).await? {
            Ok(()) => {
                self.emit(ConnectionEvent::Drain);
                Ok(())
            }
            Err(err) => {
                self.emit(ConnectionEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Read exactly one message.
    pub(crate) async fn recv(&self, conn: &mut Connection) -> Result<Message> {
        // ---
        match self.bounded(conn.next()).await? {
            Some(Ok(message)) => Ok(message),
            Some(Err(err)) => {
                self.emit(ConnectionEvent::Error(err.to_string()));
                Err(err)
            }
            None => {
                self.emit(ConnectionEvent::End);
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Shut the connection down and emit `Close`.
    pub(crate) async fn close(&self, conn: Connection) {
        // ---
        let mut stream = conn.into_inner();
        if let Err(_err) = stream.shutdown().await {
            log_debug!("socket shutdown failed: {_err}");
        }
        self.emit(ConnectionEvent::Close);
    }

    /// Run `fut` under the per-connection timeout, if one is configured.
    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Result<T> {
        // ---
        if self.timeout.is_zero() {
            return Ok(fut.await);
        }
        match time::timeout(self.timeout, fut).await {
            Ok(out) => Ok(out),
            Err(_) => {
                self.emit(ConnectionEvent::Timeout);
                Err(Error::Timeout)
            }
        }
    }

    /// Republish an event; a send error only means nobody is subscribed.
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }
}
