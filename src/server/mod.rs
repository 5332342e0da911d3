// src/server/mod.rs

//! RPC server implementation.
//!
//! # Architecture
//!
//! A [`Server`] is a per-method handler registry plus a listening TCP
//! transport. Each accepted connection gets its own task that decodes the
//! incoming byte stream into messages and dispatches them in arrival
//! order. Request handler invocations are spawned, so a slow handler
//! never stalls a connection's decode loop, and responses are written
//! back on the same connection as their handlers complete.
//!
//! Messages naming a method with no registered handler are silently
//! dropped: no error response is written and the connection stays open.

mod handler;

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use handler::{boxed_notify, boxed_request, typed_request, BoxedNotifyHandler, BoxedRequestHandler};
pub use handler::HandlerOutcome;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    CodecOptions,
    Message,
    MessageCodec,
    Result,
};

type ResponseSink = SplitSink<Framed<TcpStream, MessageCodec>, Message>;

/// Per-method handler registry.
///
/// Each method name has at most one active handler; registering a name
/// again replaces the previous handler.
#[derive(Default)]
struct Registry {
    // ---
    requests: RwLock<HashMap<String, BoxedRequestHandler>>,
    notifications: RwLock<HashMap<String, BoxedNotifyHandler>>,
}

/// MessagePack-RPC server.
///
/// Cheap to clone; clones share the handler registry.
///
/// # Example
///
/// ```no_run
/// use mprpc::{CodecOptions, Server, Value};
///
/// # async fn example() -> mprpc::Result<()> {
/// let server = Server::new(CodecOptions::default());
///
/// server
///     .on_request("foo", |_params| async move { Ok(Value::from("bar")) })
///     .await;
///
/// let handle = server.listen(("127.0.0.1", 18800)).await?;
/// // ... serve until shutdown ...
/// handle.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    // ---
    registry: Arc<Registry>,
    codec: CodecOptions,
}

impl Server {
    // ---

    /// Create a server with the given codec options.
    pub fn new(codec: CodecOptions) -> Self {
        // ---
        Self {
            registry: Arc::new(Registry::default()),
            codec,
        }
    }

    /// Register an async request handler for a method name.
    ///
    /// The handler receives the positional params and returns the call's
    /// outcome: `Ok` becomes the result (normalized to a sequence), `Err`
    /// becomes the error payload. Registering a name again replaces the
    /// previous handler.
    pub async fn on_request<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutcome> + Send + 'static,
    {
        // ---
        let mut requests = self.registry.requests.write().await;
        requests.insert(method.into(), boxed_request(handler));
    }

    /// Register an async notification handler for a method name.
    ///
    /// The handler receives the positional params only; no response is
    /// ever produced for a notification.
    pub async fn on_notify<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let mut notifications = self.registry.notifications.write().await;
        notifications.insert(method.into(), boxed_notify(handler));
    }

    /// Register a typed request handler.
    ///
    /// A one-argument call deserializes `P` from the argument itself, a
    /// multi-argument call from the whole param sequence. The returned
    /// value is serialized into the result; handler errors and conversion
    /// failures become the response's error payload.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mprpc::Server;
    /// # async fn example(server: Server) {
    /// server
    ///     .register("add", |(a, b): (i64, i64)| async move { Ok(a + b) })
    ///     .await;
    /// # }
    /// ```
    pub async fn register<F, Fut, P, R>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(P) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        // ---
        let mut requests = self.registry.requests.write().await;
        requests.insert(method.into(), typed_request(handler));
    }

    /// Bind `addr` and start accepting connections.
    ///
    /// Connections are accepted and served concurrently on their own
    /// tasks. Handlers may still be registered after listening has
    /// started; dispatch sees the registry as it is when each message
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the listener cannot bind.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> Result<ServerHandle> {
        // ---
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown, mut on_shutdown) = watch::channel(false);
        let registry = Arc::clone(&self.registry);
        let codec = self.codec.clone();

        let accept_loop = tokio::spawn(async move {
            // ---
            loop {
                tokio::select! {
                    _ = on_shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _peer)) => {
                            log_debug!("accepted connection from {_peer}");
                            tokio::spawn(serve_connection(
                                stream,
                                Arc::clone(&registry),
                                codec.clone(),
                            ));
                        }
                        Err(_err) => {
                            log_warn!("accept failed: {_err}");
                        }
                    },
                }
            }
        });

        log_info!("server listening on {local_addr}");

        Ok(ServerHandle {
            local_addr,
            shutdown,
            accept_loop,
        })
    }
}

/// Handle to a listening server.
///
/// Dropping the handle stops the accept loop as well; prefer
/// [`close`](Self::close) to wait for it to finish. Connections already
/// accepted run on their own tasks and finish processing independently.
pub struct ServerHandle {
    // ---
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_loop: JoinHandle<()>,
}

impl ServerHandle {
    // ---

    /// The address the server is listening on (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn close(self) {
        // ---
        let _ = self.shutdown.send(true);
        if let Err(_err) = self.accept_loop.await {
            log_error!("accept loop task failed: {_err}");
        }
    }
}

/// Decode and dispatch messages from one connection until it closes or
/// produces undecodable input.
async fn serve_connection(stream: TcpStream, registry: Arc<Registry>, codec: CodecOptions) {
    // ---
    let framed = Framed::new(stream, MessageCodec::new(codec));
    let (sink, mut messages) = framed.split();
    let sink = Arc::new(Mutex::new(sink));

    while let Some(decoded) = messages.next().await {
        match decoded {
            Ok(message) => dispatch(message, &registry, &sink).await,
            Err(_err) => {
                // Undecodable input poisons the rest of the byte stream;
                // give up on this connection only.
                log_warn!("closing connection on decode failure: {_err}");
                break;
            }
        }
    }
}

/// Route one message to its registered handler.
///
/// Request invocations are spawned so decoding can continue; their
/// responses are written back on this connection's shared sink as they
/// complete.
async fn dispatch(message: Message, registry: &Arc<Registry>, sink: &Arc<Mutex<ResponseSink>>) {
    // ---
    match message {
        Message::Request { id, method, params } => {
            let handler = registry.requests.read().await.get(&method).cloned();
            let Some(handler) = handler else {
                log_debug!("no request handler for {method:?}, dropping message");
                return;
            };

            let sink = Arc::clone(sink);
            tokio::spawn(async move {
                // ---
                let response = Message::response(id, handler(params).await);
                let mut sink = sink.lock().await;
                if let Err(_err) = sink.send(response).await {
                    log_warn!("failed to write response for msgid {id}: {_err}");
                }
            });
        }
        Message::Notification { method, params } => {
            let handler = registry.notifications.read().await.get(&method).cloned();
            match handler {
                Some(handler) => {
                    tokio::spawn(handler(params));
                }
                None => {
                    log_debug!("no notification handler for {method:?}, dropping message");
                }
            }
        }
        Message::Response { id: _id, .. } => {
            log_debug!("ignoring unexpected response message (msgid {_id})");
        }
    }
}
