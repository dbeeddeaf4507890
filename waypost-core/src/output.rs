//! Handler return values and the output types that format them.
//!
//! A handler returns a [`Reply`]: a [`Payload`] plus an optional status. The
//! handler's declared [`OutputType`] turns it into a [`Response`]. A missing
//! status means 200 for every output type.

use crate::{Error, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Keyword options handed to [`JsonRender::to_json`], e.g. `{"full": true}`.
pub type JsonOptions = Map<String, Value>;

/// Encode a value as pretty JSON with a four-space indent.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(128);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Fallback JSON rendering for values that do not serialize directly.
pub trait JsonRender: Send + Sync {
    /// Render with the output type's options; `None` if the value cannot be
    /// represented.
    fn to_json(&self, options: &JsonOptions) -> Option<Value>;
}

/// What a handler produced.
pub enum Payload {
    /// No value at all.
    None,
    /// A value that serialized cleanly.
    Value(Value),
    /// A value whose direct serialization failed, with its fallback renderer
    /// if it has one.
    Deferred {
        error: String,
        fallback: Option<Box<dyn JsonRender>>,
    },
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::None => f.write_str("None"),
            Payload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Payload::Deferred { error, fallback } => f
                .debug_struct("Deferred")
                .field("error", error)
                .field("fallback", &fallback.is_some())
                .finish(),
        }
    }
}

/// A handler's return value with an optional explicit status.
#[derive(Debug)]
pub struct Reply {
    pub payload: Payload,
    pub status: Option<u16>,
}

impl Reply {
    /// Serialize `value` now. A serialization failure is kept and reported
    /// when the reply is formatted.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        let payload = match serde_json::to_value(value) {
            Ok(value) => Payload::Value(value),
            Err(e) => Payload::Deferred {
                error: e.to_string(),
                fallback: None,
            },
        };
        Self::from_payload(payload)
    }

    /// Like [`Reply::json`], keeping `value` as its own fallback renderer.
    pub fn json_or<T>(value: T) -> Self
    where
        T: Serialize + JsonRender + 'static,
    {
        match serde_json::to_value(&value) {
            Ok(value) => Self::from_payload(Payload::Value(value)),
            Err(e) => Self::from_payload(Payload::Deferred {
                error: e.to_string(),
                fallback: Some(Box::new(value)),
            }),
        }
    }

    /// A value that only renders itself through [`JsonRender`].
    pub fn document<T: JsonRender + 'static>(value: T) -> Self {
        Self::from_payload(Payload::Deferred {
            error: "value has no direct JSON form".to_string(),
            fallback: Some(Box::new(value)),
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::from_payload(Payload::Value(Value::String(text.into())))
    }

    pub fn empty() -> Self {
        Self::from_payload(Payload::None)
    }

    fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Status the response will carry.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::from_payload(Payload::Value(value))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl<T: Into<Reply>> From<(T, u16)> for Reply {
    fn from((value, status): (T, u16)) -> Self {
        value.into().with_status(status)
    }
}

/// Output-type descriptor declared by every handler.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    /// Pretty JSON, `application/json`.
    Json(JsonOptions),
    /// Plain text, `text/plain`. Strings pass through, anything else is
    /// written as compact JSON.
    Text,
    /// No body and no content type. Any payload is an error.
    Empty,
}

impl OutputType {
    pub fn json() -> Self {
        OutputType::Json(JsonOptions::new())
    }

    /// JSON with options for the fallback renderer.
    pub fn json_with(options: impl IntoIterator<Item = (String, Value)>) -> Self {
        OutputType::Json(options.into_iter().collect())
    }

    pub fn format(&self, reply: Reply) -> Result<Response, Error> {
        let status = reply.status();
        match self {
            OutputType::Json(options) => {
                let value = resolve(reply.payload, options)?;
                Response::json(status, &value)
            }
            OutputType::Text => {
                let text = match resolve(reply.payload, &JsonOptions::new())? {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Ok(Response::text(status, text))
            }
            OutputType::Empty => match reply.payload {
                Payload::None | Payload::Value(Value::Null) => Ok(Response::empty(status)),
                other => Err(Error::UnexpectedResponseType(format!(
                    "Incorrect response format, expected no payload but got {:?}",
                    other
                ))),
            },
        }
    }
}

impl Default for OutputType {
    fn default() -> Self {
        OutputType::json()
    }
}

fn resolve(payload: Payload, options: &JsonOptions) -> Result<Value, Error> {
    match payload {
        Payload::None => Ok(Value::Null),
        Payload::Value(value) => Ok(value),
        Payload::Deferred { error, fallback } => fallback
            .and_then(|renderer| renderer.to_json(options))
            .ok_or_else(|| {
                Error::UnexpectedResponseType(format!(
                    "Value cannot be converted to JSON format: {}",
                    error
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Serializer, Error as _};
    use serde_json::json;

    /// Serializes only through its fallback.
    struct Topic {
        id: u32,
        body: String,
    }

    impl Serialize for Topic {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("Topic is not directly serializable"))
        }
    }

    impl JsonRender for Topic {
        fn to_json(&self, options: &JsonOptions) -> Option<Value> {
            if options.get("full") == Some(&json!(true)) {
                Some(json!({"id": self.id, "body": self.body}))
            } else {
                Some(json!({"id": self.id}))
            }
        }
    }

    #[test]
    fn test_encode_json_indent() {
        let out = encode_json(&json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_json_default_status() {
        let response = OutputType::json().format(Reply::json(&json!({"ok": true}))).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        let decoded: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(decoded, json!({"ok": true}));
    }

    #[test]
    fn test_explicit_status() {
        let reply: Reply = (json!("made"), 201u16).into();
        let response = OutputType::json().format(reply).unwrap();
        assert_eq!(response.status, 201);
    }

    #[test]
    fn test_json_fallback_receives_options() {
        let topic = || Topic {
            id: 3,
            body: "hi".into(),
        };

        let response = OutputType::json().format(Reply::json_or(topic())).unwrap();
        let decoded: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(decoded, json!({"id": 3}));

        let full = OutputType::json_with([("full".to_string(), json!(true))]);
        let response = full.format(Reply::json_or(topic())).unwrap();
        let decoded: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(decoded, json!({"id": 3, "body": "hi"}));
    }

    #[test]
    fn test_json_without_fallback_is_unexpected() {
        struct Opaque;
        impl Serialize for Opaque {
            fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(S::Error::custom("opaque"))
            }
        }

        let err = OutputType::json().format(Reply::json(&Opaque)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponseType(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_text_output() {
        let response = OutputType::Text.format(Reply::text("hello")).unwrap();
        assert_eq!(response.body, b"hello");
        assert_eq!(response.content_type.as_deref(), Some("text/plain"));

        let response = OutputType::Text.format(Reply::json(&42)).unwrap();
        assert_eq!(response.body, b"42");
    }

    #[test]
    fn test_empty_output() {
        let response = OutputType::Empty
            .format(Reply::empty().with_status(204))
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
        assert!(response.content_type.is_none());

        let err = OutputType::Empty.format(Reply::text("oops")).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponseType(_)));
    }
}
