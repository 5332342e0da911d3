// src/client/mod.rs

//! RPC client implementation.
//!
//! # Architecture
//!
//! Every call opens its own TCP connection, writes exactly one message,
//! and (for requests) reads exactly one response before closing. There is
//! no connection reuse and no cap on concurrently outstanding calls; each
//! call's connection and codec pipeline is private to that call, so
//! concurrent calls resolve independently of issuance order.
//!
//! Correlation ids are drawn from a client-owned atomic generator. They
//! only need to be unique among this client's outstanding calls.
//!
//! # Observability
//!
//! Low-level connection events are republished on a broadcast channel;
//! see [`Client::events`]. A call's logical outcome is always delivered
//! through its returned future, never through the event channel.

use std::sync::Arc;

use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::transport::Connector;
use crate::{
    // ---
    log_warn,
    ClientConfig,
    ConnectionEvent,
    Error,
    Message,
    MsgIdGenerator,
    Result,
};

/// Capacity of the lifecycle event channel; slow subscribers lag rather
/// than block calls.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// MessagePack-RPC client.
///
/// Cheap to clone (internally `Arc`-backed); clones share the id
/// generator and the event channel.
///
/// # Example
///
/// ```no_run
/// use mprpc::{Client, ClientConfig, Value};
///
/// # async fn example() -> mprpc::Result<()> {
/// let client = Client::new(ClientConfig::new(18800));
///
/// let results = client
///     .request("foo", vec![Value::from(1), Value::from(2), Value::from(3)])
///     .await?;
/// assert_eq!(results, vec![Value::from("bar")]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    connector: Connector,
    msgid: MsgIdGenerator,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Client {
    // ---

    /// Create a client. No connection is opened until the first call.
    pub fn new(config: ClientConfig) -> Self {
        // ---
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                connector: Connector::new(config, events.clone()),
                msgid: MsgIdGenerator::new(),
                events,
            }),
        }
    }

    /// Subscribe to connection lifecycle events.
    ///
    /// Events describe transport behavior (connect, drain, close, …) for
    /// every connection this client opens, independent of the logical
    /// outcome of the calls that opened them.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Send a request and await its result sequence.
    ///
    /// Opens a fresh connection, writes `[0, msgid, method, params]`, and
    /// waits for exactly one response on the same connection. The
    /// connection is closed before the result is returned.
    ///
    /// # Errors
    ///
    /// - `Error::Remote` - the handler supplied an error payload
    /// - `Error::Protocol` - the reply was not a response message
    /// - `Error::Timeout`, `Error::Io`, `Error::ConnectionClosed` -
    ///   connection-level failures before a response arrived
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Vec<Value>> {
        // ---
        let id = self.inner.msgid.next();
        let message = Message::Request {
            id,
            method: method.into(),
            params,
        };

        let connector = &self.inner.connector;
        let mut conn = connector.open().await?;
        let reply = match connector.send(&mut conn, message).await {
            Ok(()) => connector.recv(&mut conn).await,
            Err(err) => Err(err),
        };
        connector.close(conn).await;

        match reply? {
            Message::Response { id: reply_id, result } => {
                if reply_id != id {
                    // One connection carries exactly one call, so the
                    // response is ours regardless; the mismatch is still
                    // worth surfacing.
                    log_warn!("response msgid {reply_id} does not match request msgid {id}");
                }
                result.map_err(Error::Remote)
            }
            other => Err(Error::Protocol(format!(
                "expected a response message, got a {}",
                other.type_name()
            ))),
        }
    }

    /// Send a notification.
    ///
    /// Opens a fresh connection, writes `[2, method, params]`, and
    /// resolves once the write has flushed. No response is awaited or
    /// expected.
    pub async fn notify(&self, method: impl Into<String>, params: Vec<Value>) -> Result<()> {
        // ---
        let message = Message::Notification {
            method: method.into(),
            params,
        };

        let connector = &self.inner.connector;
        let mut conn = connector.open().await?;
        let sent = connector.send(&mut conn, message).await;
        connector.close(conn).await;
        sent
    }

    /// Typed variant of [`request`](Self::request).
    ///
    /// `params` is serialized to msgpack: a sequence-valued serialization
    /// (tuple, `Vec`, …) becomes the positional arguments, anything else
    /// becomes a single argument. A one-element result sequence
    /// deserializes from its element, anything else from the whole
    /// sequence.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mprpc::{Client, ClientConfig};
    /// # async fn example() -> mprpc::Result<()> {
    /// # let client = Client::new(ClientConfig::new(18800));
    /// let sum: i64 = client.call("add", (2, 3)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<P, R>(&self, method: impl Into<String>, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        // ---
        let params = match rmpv::ext::to_value(params).map_err(convert_err)? {
            Value::Array(values) => values,
            single => vec![single],
        };

        let mut results = self.request(method, params).await?;
        let value = if results.len() == 1 {
            results.remove(0)
        } else {
            Value::Array(results)
        };
        rmpv::ext::from_value(value).map_err(convert_err)
    }
}

fn convert_err(err: impl std::fmt::Display) -> Error {
    Error::Convert(err.to_string())
}
