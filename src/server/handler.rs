use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outcome of a request handler.
///
/// `Ok` carries the result value (normalized to a sequence when the
/// response is built), `Err` carries the error payload written into the
/// response's `error` field.
pub type HandlerOutcome = std::result::Result<Value, Value>;

/// Type-erased async request handler.
///
/// Wrapped in `Arc` for cheap cloning when spawning invocations.
pub(super) type BoxedRequestHandler = Arc<
    dyn Fn(Vec<Value>) -> Pin<Box<dyn Future<Output = HandlerOutcome> + Send>> + Send + Sync,
>;

/// Type-erased async notification handler.
pub(super) type BoxedNotifyHandler =
    Arc<dyn Fn(Vec<Value>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub(super) fn boxed_request<F, Fut>(handler: F) -> BoxedRequestHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    // ---
    Arc::new(move |params| {
        let fut = Box::pin(handler(params));
        fut as Pin<Box<dyn Future<Output = HandlerOutcome> + Send>>
    })
}

pub(super) fn boxed_notify<F, Fut>(handler: F) -> BoxedNotifyHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    // ---
    Arc::new(move |params| {
        let fut = Box::pin(handler(params));
        fut as Pin<Box<dyn Future<Output = ()> + Send>>
    })
}

/// Wrap a typed handler into a type-erased request handler.
///
/// A one-argument call deserializes `P` from the argument itself, a
/// multi-argument call from the whole sequence (the mirror image of the
/// client's typed `call`). Conversion failures and handler errors both
/// surface as the response's error payload.
pub(super) fn typed_request<F, Fut, P, R>(handler: F) -> BoxedRequestHandler
where
    F: Fn(P) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = crate::Result<R>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    // ---
    Arc::new(move |params: Vec<Value>| {
        let handler = handler.clone();
        let fut = Box::pin(async move {
            // ---
            let mut params = params;
            let value = if params.len() == 1 {
                params.remove(0)
            } else {
                Value::Array(params)
            };

            let params: P = match rmpv::ext::from_value(value) {
                Ok(params) => params,
                Err(err) => return Err(Value::from(format!("invalid params: {err}"))),
            };

            match handler(params).await {
                Ok(result) => match rmpv::ext::to_value(result) {
                    Ok(value) => Ok(value),
                    Err(err) => Err(Value::from(format!("unserializable result: {err}"))),
                },
                Err(err) => Err(Value::from(err.to_string())),
            }
        });

        fut as Pin<Box<dyn Future<Output = HandlerOutcome> + Send>>
    })
}
