//! The three msgpack-rpc message shapes.
//!
//! Every message is a fixed-arity msgpack array whose first element is a
//! type tag: `[0, msgid, method, params]` for requests,
//! `[1, msgid, error, result]` for responses, and `[2, method, params]`
//! for notifications.

use rmpv::Value;

use crate::error::{Error, Result};

const TYPE_REQUEST: u64 = 0;
const TYPE_RESPONSE: u64 = 1;
const TYPE_NOTIFY: u64 = 2;

/// A decoded protocol message.
///
/// Messages are ephemeral: constructed when a call is issued or when the
/// codec decodes bytes, and discarded once dispatch or correlation
/// completes.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `[0, msgid, method, params]` — expects exactly one `Response` with
    /// the same msgid on the same connection.
    Request {
        /// Correlation id pairing this request with its response.
        id: u32,
        /// Name of the handler to invoke.
        method: String,
        /// Positional arguments.
        params: Vec<Value>,
    },

    /// `[1, msgid, error, result]` — `Ok` carries the result sequence,
    /// `Err` carries the error payload.
    Response {
        /// Correlation id echoed from the request.
        id: u32,
        /// Call outcome.
        result: std::result::Result<Vec<Value>, Value>,
    },

    /// `[2, method, params]` — carries no msgid and produces no reply.
    Notification {
        /// Name of the handler to invoke.
        method: String,
        /// Positional arguments.
        params: Vec<Value>,
    },
}

impl Message {
    /// Build the response to msgid `id` from a handler outcome.
    ///
    /// The result is normalized to an ordered sequence: a sequence-valued
    /// result is used as-is, any other value is wrapped into a one-element
    /// sequence.
    pub(crate) fn response(id: u32, outcome: std::result::Result<Value, Value>) -> Self {
        // ---
        Message::Response {
            id,
            result: outcome.map(|value| match value {
                Value::Array(values) => values,
                single => vec![single],
            }),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Message::Request { .. } => "request",
            Message::Response { .. } => "response",
            Message::Notification { .. } => "notification",
        }
    }

    /// Encode into the wire-level msgpack array.
    pub(crate) fn into_value(self) -> Value {
        // ---
        match self {
            Message::Request { id, method, params } => Value::Array(vec![
                Value::from(TYPE_REQUEST),
                Value::from(id),
                Value::from(method),
                Value::Array(params),
            ]),
            Message::Response { id, result } => {
                let (error, result) = match result {
                    Ok(values) => (Value::Nil, Value::Array(values)),
                    Err(payload) => (payload, Value::Nil),
                };
                Value::Array(vec![
                    Value::from(TYPE_RESPONSE),
                    Value::from(id),
                    error,
                    result,
                ])
            }
            Message::Notification { method, params } => Value::Array(vec![
                Value::from(TYPE_NOTIFY),
                Value::from(method),
                Value::Array(params),
            ]),
        }
    }

    /// Parse a decoded msgpack value into a message.
    ///
    /// The type tag, arity, and field types are validated; anything else
    /// is a protocol violation.
    pub(crate) fn from_value(value: Value) -> Result<Self> {
        // ---
        let fields = match value {
            Value::Array(fields) => fields,
            other => {
                return Err(Error::Protocol(format!(
                    "expected a message array, got {other}"
                )))
            }
        };

        let tag = fields
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Protocol("message is missing its type tag".to_owned()))?;

        match tag {
            TYPE_REQUEST => {
                let [_, id, method, params] = into_fields::<4>(fields, "request")?;
                Ok(Message::Request {
                    id: msgid(id)?,
                    method: method_name(method)?,
                    params: params_list(params)?,
                })
            }
            TYPE_RESPONSE => {
                let [_, id, error, result] = into_fields::<4>(fields, "response")?;
                let result = if error.is_nil() {
                    Ok(match result {
                        Value::Nil => Vec::new(),
                        Value::Array(values) => values,
                        // A peer that did not normalize still yields a
                        // sequence.
                        single => vec![single],
                    })
                } else {
                    Err(error)
                };
                Ok(Message::Response {
                    id: msgid(id)?,
                    result,
                })
            }
            TYPE_NOTIFY => {
                let [_, method, params] = into_fields::<3>(fields, "notification")?;
                Ok(Message::Notification {
                    method: method_name(method)?,
                    params: params_list(params)?,
                })
            }
            other => Err(Error::Protocol(format!("unknown message type tag {other}"))),
        }
    }
}

fn into_fields<const N: usize>(fields: Vec<Value>, what: &str) -> Result<[Value; N]> {
    // ---
    let arity = fields.len();
    <[Value; N]>::try_from(fields).map_err(|_| {
        Error::Protocol(format!(
            "{what} message must have {N} fields, got {arity}"
        ))
    })
}

fn msgid(value: Value) -> Result<u32> {
    // ---
    value
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "msgid must be a 32-bit unsigned integer, got {value}"
            ))
        })
}

fn method_name(value: Value) -> Result<String> {
    // ---
    match value {
        Value::String(s) => s
            .into_str()
            .ok_or_else(|| Error::Protocol("method name is not valid UTF-8".to_owned())),
        other => Err(Error::Protocol(format!(
            "method must be a string, got {other}"
        ))),
    }
}

fn params_list(value: Value) -> Result<Vec<Value>> {
    // ---
    match value {
        Value::Array(values) => Ok(values),
        other => Err(Error::Protocol(format!(
            "params must be a sequence, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn request() -> Message {
        Message::Request {
            id: 42,
            method: "foo".to_owned(),
            params: vec![Value::from(1), Value::from(2), Value::from(3)],
        }
    }

    #[test]
    fn test_request_value_round_trip() {
        // ---
        let value = request().into_value();

        assert_eq!(
            value,
            Value::Array(vec![
                Value::from(0),
                Value::from(42),
                Value::from("foo"),
                Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)]),
            ])
        );
        assert_eq!(Message::from_value(value).unwrap(), request());
    }

    #[test]
    fn test_notification_has_no_msgid() {
        // ---
        let message = Message::Notification {
            method: "qux".to_owned(),
            params: vec![Value::from("a")],
        };

        let Value::Array(fields) = message.clone().into_value() else {
            panic!("notification must encode to an array");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], Value::from(2));
        assert_eq!(Message::from_value(Value::Array(fields)).unwrap(), message);
    }

    #[test]
    fn test_response_success_and_error_encoding() {
        // ---
        let ok = Message::response(7, Ok(Value::from("bar")));
        assert_eq!(
            ok.clone().into_value(),
            Value::Array(vec![
                Value::from(1),
                Value::from(7),
                Value::Nil,
                Value::Array(vec![Value::from("bar")]),
            ])
        );

        let failed = Message::response(7, Err(Value::from("boom")));
        assert_eq!(
            failed.into_value(),
            Value::Array(vec![
                Value::from(1),
                Value::from(7),
                Value::from("boom"),
                Value::Nil,
            ])
        );
    }

    #[test]
    fn test_response_normalization_keeps_sequences() {
        // ---
        let already_sequence = Message::response(
            1,
            Ok(Value::Array(vec![Value::from(1), Value::from(2)])),
        );
        let Message::Response { result, .. } = already_sequence else {
            panic!("expected a response");
        };
        assert_eq!(result.unwrap(), vec![Value::from(1), Value::from(2)]);

        let wrapped = Message::response(2, Ok(Value::Nil));
        let Message::Response { result, .. } = wrapped else {
            panic!("expected a response");
        };
        assert_eq!(result.unwrap(), vec![Value::Nil]);
    }

    #[test]
    fn test_lenient_response_result_decoding() {
        // ---
        // nil result decodes to an empty sequence, a stray scalar is
        // wrapped rather than rejected.
        let nil_result = Value::Array(vec![Value::from(1), Value::from(3), Value::Nil, Value::Nil]);
        let Message::Response { result, .. } = Message::from_value(nil_result).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(result.unwrap(), Vec::<Value>::new());

        let scalar_result = Value::Array(vec![
            Value::from(1),
            Value::from(3),
            Value::Nil,
            Value::from("bar"),
        ]);
        let Message::Response { result, .. } = Message::from_value(scalar_result).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(result.unwrap(), vec![Value::from("bar")]);
    }

    #[test]
    fn test_rejects_unknown_type_tag() {
        // ---
        let value = Value::Array(vec![
            Value::from(9),
            Value::from("foo"),
            Value::Array(vec![]),
        ]);
        assert!(matches!(
            Message::from_value(value),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_arity() {
        // ---
        let value = Value::Array(vec![Value::from(0), Value::from(1)]);
        assert!(matches!(
            Message::from_value(value),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_non_array_message() {
        // ---
        assert!(matches!(
            Message::from_value(Value::from("nope")),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_msgid() {
        // ---
        let value = Value::Array(vec![
            Value::from(0),
            Value::from(u64::from(u32::MAX) + 1),
            Value::from("foo"),
            Value::Array(vec![]),
        ]);
        assert!(matches!(
            Message::from_value(value),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_non_string_method() {
        // ---
        let value = Value::Array(vec![
            Value::from(2),
            Value::from(17),
            Value::Array(vec![]),
        ]);
        assert!(matches!(
            Message::from_value(value),
            Err(Error::Protocol(_))
        ));
    }
}
