// HTTP request and response types

use crate::body::{self, Body, FormData};
use crate::params::ParamSource;
use crate::{Error, output, status};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Typed path parameters extracted by the route table.
pub type PathParams = HashMap<String, Value>;

/// Case-insensitive header container.
///
/// Names are matched ignoring ASCII case and emitted in canonical
/// `Content-Type` form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value, joining it to an existing one with `", "`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Headers as `(Canonical-Name, value)` pairs, ready for the wire.
    pub fn to_wire(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, value)| (canonical_header_name(name), value.clone()))
            .collect()
    }
}

/// `content-type` -> `Content-Type`, `dnt` -> `DNT`
pub fn canonical_header_name(name: &str) -> String {
    const UPPERCASE: [&str; 3] = ["http", "dnt", "xml"];
    name.split('-')
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            if UPPERCASE.contains(&lower.as_str()) {
                lower.to_ascii_uppercase()
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Request data as handed over by the transport, before any parsing.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Create a raw request. A `?query` suffix on `target` is split off.
    pub fn new(method: impl Into<String>, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method: method.into(),
            path: path.to_string(),
            query_string: query.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Create a raw request from an encoded request target, as sent on the
    /// wire. The query is split off first, then the path is percent-decoded;
    /// the query string stays encoded for the form decoder.
    pub fn from_target(method: impl Into<String>, target: &str) -> Result<Self, Error> {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = urlencoding::decode(path).map_err(|e| {
            Error::RequestParse(format!("Request path is not valid UTF-8: {}", e))
        })?;
        Ok(Self {
            method: method.into(),
            path: path.into_owned(),
            query_string: query.to_string(),
            ..Self::default()
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body with its content type and length headers.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.headers.insert("Content-Type", content_type);
        self.headers
            .insert("Content-Length", self.body.len().to_string());
        self
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::RequestParse(format!("Failed to encode JSON body: {}", e)))?;
        Ok(self.with_body("application/json", body))
    }

    pub fn with_form(self, pairs: &[(&str, &str)]) -> Result<Self, Error> {
        let body = serde_urlencoded::to_string(pairs)
            .map_err(|e| Error::RequestParse(format!("Failed to encode form body: {}", e)))?;
        Ok(self.with_body("application/x-www-form-urlencoded", body))
    }

    /// Declared body length; falls back to the actual body size.
    pub fn content_length(&self) -> Result<usize, Error> {
        match self.headers.get("Content-Length") {
            Some(value) => value.trim().parse().map_err(|_| {
                Error::RequestParse(format!("Invalid Content-Length header: {}", value))
            }),
            None => Ok(self.body.len()),
        }
    }
}

/// Parsed inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Headers,
    pub args: FormData,
    pub body: Body,
    /// Populated by routing; `None` until a route matched.
    pub path_params: Option<PathParams>,
}

impl Request {
    /// Parse raw transport data, rejecting bodies over `max_body_size`.
    pub fn parse(raw: RawRequest, max_body_size: usize) -> Result<Self, Error> {
        let method = raw.method.trim().to_ascii_uppercase();
        if method.is_empty() {
            return Err(Error::RequestParse("Missing request method".to_string()));
        }

        let path = format!("/{}", raw.path.trim_start_matches('/'));
        let args = body::parse_urlencoded(&raw.query_string)?;
        let declared_len = raw.content_length()?;
        let body = body::decode_body(
            raw.headers.get("Content-Type"),
            declared_len,
            &raw.body,
            max_body_size,
        )?;

        Ok(Self {
            method,
            path,
            headers: raw.headers,
            args,
            body,
            path_params: None,
        })
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.path_params.as_ref()?.get(name)
    }

    /// Get a query argument by name
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Whether the method carries a body that parameters may be read from.
    pub fn is_mutating(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT" | "PATCH")
    }
}

/// Path parameters, then query arguments, then the body for `POST`, `PUT`
/// and `PATCH`. The first location holding the name wins.
impl ParamSource for Request {
    fn retrieve_param(&self, name: &str) -> Option<&Value> {
        self.param(name)
            .or_else(|| self.arg(name))
            .or_else(|| self.is_mutating().then(|| self.body.get(name)).flatten())
    }
}

/// Outbound response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        let body = body.into();
        let mut headers = Headers::new();
        if let Some(content_type) = content_type {
            headers.insert("Content-Type", content_type);
        }
        headers.insert("Content-Length", body.len().to_string());
        Self {
            status,
            headers,
            body,
            content_type: content_type.map(str::to_string),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into().into_bytes(), Some("text/plain"))
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, Error> {
        let body = output::encode_json(value)
            .map_err(|e| Error::UnexpectedResponseType(e.to_string()))?;
        Ok(Self::new(status, body, Some("application/json")))
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new(), None)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Status line text, e.g. `"201 Created"`.
    pub fn status_message(&self) -> String {
        status::status_line(self.status)
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Body as UTF-8 text, lossy.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
