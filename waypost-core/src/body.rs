//! Request body decoding.
//!
//! The decoder is picked from the declared `Content-Type` using a fixed table:
//!
//! | Content-Type                        | Result          |
//! |-------------------------------------|-----------------|
//! | `application/json`                  | [`Body::Json`]  |
//! | `application/x-www-form-urlencoded` | [`Body::Form`]  |
//! | `text/plain`                        | [`Body::Text`]  |
//! | `multipart/form-data`               | error           |
//! | anything else                       | error           |
//!
//! The size check runs before any of these decoders.

use crate::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Largest request body accepted by default (100 KiB).
pub const MAX_REQUEST_BODY_SIZE: usize = 100 * 1024;

/// Decoded key/value pairs from a query string or form body.
///
/// A key seen once maps to a string, a repeated key maps to an array of
/// strings in arrival order.
pub type FormData = HashMap<String, Value>;

/// Decoded request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Form(FormData),
    Json(Value),
    Text(String),
}

impl Body {
    /// Look up a named field. Only form bodies and JSON objects have fields.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Body::Form(form) => form.get(name),
            Body::Json(Value::Object(map)) => map.get(name),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

/// Decode a raw body.
///
/// `declared_len` is the request's `Content-Length`. Both it and the bytes
/// actually received are checked against `limit`; a zero length then yields
/// an empty body without looking at the content type.
pub fn decode_body(
    content_type: Option<&str>,
    declared_len: usize,
    raw: &[u8],
    limit: usize,
) -> Result<Body, Error> {
    let size = declared_len.max(raw.len());
    if size > limit {
        return Err(Error::BodyTooLarge { size, limit });
    }
    if declared_len == 0 {
        return Ok(Body::Empty);
    }

    let raw = &raw[..declared_len.min(raw.len())];
    let media_type = content_type.map(media_type).unwrap_or_default();

    match media_type.as_str() {
        "application/json" => serde_json::from_slice(raw)
            .map(Body::Json)
            .map_err(|e| Error::RequestParse(format!("Invalid JSON body: {}", e))),
        "application/x-www-form-urlencoded" => Ok(Body::Form(parse_urlencoded(utf8(raw)?)?)),
        "text/plain" => Ok(Body::Text(utf8(raw)?.to_string())),
        "multipart/form-data" => Err(Error::UnsupportedBodyType(
            "Parsing multipart/form-data is not supported".to_string(),
        )),
        "" => Err(Error::UnsupportedBodyType(
            "Request body sent without a Content-Type".to_string(),
        )),
        other => Err(Error::UnsupportedBodyType(other.to_string())),
    }
}

/// Decode an `application/x-www-form-urlencoded` string, keeping blank values.
pub fn parse_urlencoded(input: &str) -> Result<FormData, Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(input)
        .map_err(|e| Error::RequestParse(format!("Failed to parse form data: {}", e)))?;

    let mut data = FormData::new();
    for (key, value) in pairs {
        match data.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Value::String(value));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(Value::String(value)),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            },
        }
    }
    Ok(data)
}

/// `"Application/JSON; charset=utf-8"` -> `"application/json"`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn utf8(raw: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(raw)
        .map_err(|e| Error::RequestParse(format!("Request body is not valid UTF-8: {}", e)))
}
