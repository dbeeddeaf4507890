// Configuration management for Waypost applications

pub mod env;
pub mod error;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use waypost_core::Settings;

/// Prefix used by [`ConfigManager::from_env`].
pub const ENV_PREFIX: &str = "WAYPOST_";

/// Key/value configuration store.
///
/// Sources are layered in the order they are loaded; a later source
/// overwrites keys set by an earlier one.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an environment variable prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// A manager with the `WAYPOST_` prefix and the process environment
    /// already loaded.
    pub fn from_env() -> Self {
        let manager = Self::with_prefix(ENV_PREFIX);
        manager.load_env();
        manager
    }

    /// Load configuration from environment variables.
    pub fn load_env(&self) {
        let vars = EnvLoader::new(self.env_prefix.clone()).load();
        self.insert_strings(vars);
    }

    /// Load from a `.env` file, then from the environment.
    ///
    /// Without a path a missing `.env` in the working directory is ignored.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                if let Err(e) = dotenvy::dotenv() {
                    tracing::debug!(error = %e, "No .env file loaded");
                }
            }
        }
        self.load_env();
        Ok(())
    }

    /// Load a JSON, TOML or `.env` file, detecting the format from its name.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        self.insert_object(data);
        Ok(())
    }

    /// Parse a document held in memory.
    pub fn load_str(&self, content: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).parse(content)?;
        self.insert_object(data);
        Ok(())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.config.write().insert(key.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .config
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.config.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Copy every key of `other` into this manager.
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.config, &other.config) {
            return;
        }
        let other = other.config.read();
        let mut config = self.config.write();
        for (key, value) in other.iter() {
            config.insert(key.clone(), value.clone());
        }
    }

    /// Build [`Settings`] from the store.
    ///
    /// Keys the store lacks keep their defaults. String values loaded from
    /// the environment are converted to the type of the default they
    /// replace, so `WAYPOST_PORT=8080` yields a number.
    pub fn settings(&self) -> Result<Settings> {
        let defaults = serde_json::to_value(Settings::default())
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        let mut document = Map::new();
        for (key, value) in self.config.read().iter() {
            let value = match defaults.get(key) {
                Some(default) => coerce_like(value, default),
                None => value.clone(),
            };
            document.insert(key.clone(), value);
        }
        serde_json::from_value(Value::Object(document))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    fn insert_strings(&self, vars: HashMap<String, String>) {
        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
    }

    fn insert_object(&self, data: Value) {
        if let Value::Object(map) = data {
            self.config.write().extend(map);
        }
    }
}

/// Reinterpret a string so it matches the JSON type of `target`.
///
/// Values that do not parse are left alone and fail at deserialization.
fn coerce_like(value: &Value, target: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };
    let raw = raw.trim();
    let coerced = match target {
        Value::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(_) => raw.parse::<u64>().ok().map(Value::from),
        _ => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
        assert!(matches!(
            manager.get::<String>("missing"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();
        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_has_key() {
        let manager = ConfigManager::new();
        manager.set("existing_key", "value").unwrap();

        assert!(manager.has("existing_key"));
        assert!(!manager.has("missing_key"));
    }

    #[test]
    fn test_merge_overwrites() {
        let base = ConfigManager::new();
        base.set("port", 8000).unwrap();
        base.set("name", "base").unwrap();

        let overrides = ConfigManager::new();
        overrides.set("port", 9000).unwrap();

        base.merge(&overrides);
        base.merge(&base.clone());
        assert_eq!(base.get::<u16>("port").unwrap(), 9000);
        assert_eq!(base.get::<String>("name").unwrap(), "base");
    }

    #[test]
    fn test_settings_from_env_strings() {
        let manager = ConfigManager::with_prefix(ENV_PREFIX);
        manager.insert_strings(EnvLoader::new(Some(ENV_PREFIX.into())).load_from([
            ("WAYPOST_PORT", "8080"),
            ("WAYPOST_DEBUG", "off"),
            ("WAYPOST_NAME", "123"),
            ("WAYPOST_LOG_LEVEL", "warn"),
        ]));

        let settings = manager.settings().unwrap();
        assert_eq!(settings.port, 8080);
        assert!(!settings.debug);
        assert_eq!(settings.name, "123");
        assert_eq!(settings.log_level(), "warn");
        assert_eq!(settings.host, "127.0.0.1");
    }

    #[test]
    fn test_settings_from_toml() {
        let manager = ConfigManager::new();
        manager
            .load_str("name = \"todo\"\nmax_body_size = 2048\n", FileFormat::Toml)
            .unwrap();

        let settings = manager.settings().unwrap();
        assert_eq!(settings.name, "todo");
        assert_eq!(settings.max_body_size, 2048);
        assert!(settings.debug);
    }

    #[test]
    fn test_settings_reject_bad_port() {
        let manager = ConfigManager::new();
        manager.set("port", "eighty").unwrap();
        assert!(matches!(
            manager.settings(),
            Err(ConfigError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_coerce_like() {
        assert_eq!(coerce_like(&json!("yes"), &json!(false)), json!(true));
        assert_eq!(coerce_like(&json!(" 42 "), &json!(0)), json!(42));
        assert_eq!(coerce_like(&json!("maybe"), &json!(true)), json!("maybe"));
        assert_eq!(coerce_like(&json!(7), &json!("x")), json!(7));
    }
}
