// Application settings

use crate::body::MAX_REQUEST_BODY_SIZE;
use serde::{Deserialize, Serialize};

/// Settings read by the application and its execution contexts.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub name: String,
    /// Log the description of every error that ends a request at `error`
    /// level instead of `debug`.
    pub debug: bool,
    /// Largest request body accepted, in bytes.
    pub max_body_size: usize,
    pub host: String,
    pub port: u16,
    /// Overrides the level derived from `debug`.
    pub log_level: Option<String>,
}

impl Settings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `log_level` if set, else `debug` when `debug` is on and `info`
    /// otherwise.
    pub fn log_level(&self) -> &str {
        match &self.log_level {
            Some(level) => level,
            None if self.debug => "debug",
            None => "info",
        }
    }

    /// `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "waypost".to_string(),
            debug: true,
            max_body_size: MAX_REQUEST_BODY_SIZE,
            host: "127.0.0.1".to_string(),
            port: 8000,
            log_level: None,
        }
    }
}
