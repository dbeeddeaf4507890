// Error types for the Waypost toolkit

use crate::{HttpStatus, Response};
use serde_json::json;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Shared, type-erased error raised by user code.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    /// A URL template could not be compiled. Raised at registration time.
    #[error("Invalid route `{template}`: {reason}")]
    InvalidRoute { template: String, reason: String },

    #[error("Cannot resolve route: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Required parameter `{0}` is missing from the request")]
    MissingParameter(String),

    #[error("Parameter `{name}` is invalid: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unsupported request body type: {0}")]
    UnsupportedBodyType(String),

    #[error("Request body of {size} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { size: usize, limit: usize },

    #[error("Failed to parse request: {0}")]
    RequestParse(String),

    #[error("Unexpected response type: {0}")]
    UnexpectedResponseType(String),

    /// An HTTP error raised on purpose by a handler, hook or extension.
    #[error("{name}: {description}")]
    Http {
        status: u16,
        name: String,
        description: String,
    },

    /// Any other error a handler let escape.
    #[error("{name}: {inner}")]
    Handler { name: String, inner: SharedError },

    /// A handler panicked.
    #[error("Handler panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Raise an HTTP error whose name is the status reason phrase.
    pub fn http(status: HttpStatus, description: impl Into<String>) -> Self {
        Error::Http {
            status: status.code(),
            name: status.reason().to_string(),
            description: description.into(),
        }
    }

    /// Raise an HTTP error with a custom short name, e.g. `"JWT Authorization Error"`.
    pub fn http_named(
        status: HttpStatus,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Error::Http {
            status: status.code(),
            name: name.into(),
            description: description.into(),
        }
    }

    /// Wrap an arbitrary user error. Its type name becomes the error name.
    pub fn handler<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Handler {
            name: short_type_name::<E>().to_string(),
            inner: Arc::new(error),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed.code(),

            Error::MissingParameter(_)
            | Error::InvalidParameter { .. }
            | Error::UnsupportedBodyType(_)
            | Error::BodyTooLarge { .. }
            | Error::RequestParse(_) => HttpStatus::BadRequest.code(),

            Error::Http { status, .. } => *status,

            Error::InvalidRoute { .. }
            | Error::UnexpectedResponseType(_)
            | Error::Handler { .. }
            | Error::Panic(_)
            | Error::Io(_) => HttpStatus::InternalServerError.code(),
        }
    }

    /// Short machine-readable name sent to clients
    pub fn name(&self) -> String {
        match self {
            Error::InvalidRoute { .. } => "Invalid Route".to_string(),
            Error::UnsupportedBodyType(_) => "Unknown Request Body Type".to_string(),
            Error::BodyTooLarge { .. } => "Request Body Too Large".to_string(),
            Error::RequestParse(_) => "Request Parse Error".to_string(),
            Error::UnexpectedResponseType(_) => "Unexpected Response Type".to_string(),
            Error::Http { name, .. } | Error::Handler { name, .. } => name.clone(),
            _ => crate::status::reason_phrase(self.status_code()).to_string(),
        }
    }

    /// Human readable description sent to clients
    pub fn description(&self) -> String {
        match self {
            Error::Http { description, .. } => description.clone(),
            Error::Handler { inner, .. } => inner.to_string(),
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRoute { .. } => ErrorKind::InvalidRoute,
            Error::RouteNotFound(_) => ErrorKind::RouteNotFound,
            Error::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Error::MissingParameter(_) => ErrorKind::MissingParameter,
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::UnsupportedBodyType(_) => ErrorKind::UnsupportedBodyType,
            Error::BodyTooLarge { .. } => ErrorKind::BodyTooLarge,
            Error::RequestParse(_) => ErrorKind::RequestParse,
            Error::UnexpectedResponseType(_) => ErrorKind::UnexpectedResponseType,
            Error::Http { .. } => ErrorKind::Http,
            Error::Handler { .. } => ErrorKind::Handler,
            Error::Panic(_) => ErrorKind::Panic,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Coarse classification of an [`Error`], kept on the normalized value so
/// error handlers can match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRoute,
    RouteNotFound,
    MethodNotAllowed,
    MissingParameter,
    InvalidParameter,
    UnsupportedBodyType,
    BodyTooLarge,
    RequestParse,
    UnexpectedResponseType,
    Http,
    Handler,
    Panic,
    Io,
}

/// The normalized error an execution context ends with.
///
/// Carries the three fields every client sees (status code, short name,
/// description) plus enough of the original error for handler lookup.
#[derive(Clone)]
pub struct HttpError {
    pub status: u16,
    pub name: String,
    pub description: String,
    pub kind: ErrorKind,
    source: Option<SharedError>,
}

impl HttpError {
    pub fn new(status: u16, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status,
            name: name.into(),
            description: description.into(),
            kind: ErrorKind::Http,
            source: None,
        }
    }

    /// The user error this was raised from, if it was raised by user code.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Downcast the originating user error.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }

    /// Default rendering: `{"code", "name", "description"}` as JSON.
    pub fn as_response(&self) -> Result<Response, Error> {
        let body = json!({
            "code": self.status,
            "name": self.name,
            "description": self.description,
        });
        Response::json(self.status, &body)
    }
}

impl From<Error> for HttpError {
    fn from(error: Error) -> Self {
        let source = match &error {
            Error::Handler { inner, .. } => Some(inner.clone()),
            _ => None,
        };
        Self {
            status: error.status_code(),
            name: error.name(),
            description: error.description(),
            kind: error.kind(),
            source,
        }
    }
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpError")
            .field("status", &self.status)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>: {}", self.name, self.description)
    }
}

impl Error {
    /// Normalize a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => message.to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Error::Panic(message)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Strip generics before taking the last path segment.
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
