// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Reads variables, optionally restricted to a prefix such as `WAYPOST_`.
///
/// Keys are stored lowercased with the prefix stripped, so `WAYPOST_PORT`
/// becomes `port`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load from the process environment.
    pub fn load(&self) -> HashMap<String, String> {
        self.load_from(env::vars())
    }

    /// Load from an explicit set of variables.
    pub fn load_from<I, K, V>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| {
                let key = key.as_ref();
                let name = match &self.prefix {
                    Some(prefix) => key.strip_prefix(prefix.as_str())?.trim_start_matches('_'),
                    None => key,
                };
                (!name.is_empty()).then(|| (name.to_lowercase(), value.into()))
            })
            .collect()
    }

    /// Read a single variable, applying the prefix.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.trim_end_matches('_'), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // set_var is unsafe on edition 2024, so these tests feed variables in
    // directly or rely on ones that are already set.

    #[test]
    fn test_prefix_is_stripped_and_lowercased() {
        let loader = EnvLoader::new(Some("WAYPOST_".to_string()));
        let vars = loader.load_from([
            ("WAYPOST_PORT", "9000"),
            ("WAYPOST_DEBUG", "false"),
            ("HOME", "/root"),
            ("WAYPOST_", "ignored"),
        ]);

        assert_eq!(vars.len(), 2);
        assert_eq!(vars["port"], "9000");
        assert_eq!(vars["debug"], "false");
    }

    #[test]
    fn test_without_prefix_keeps_everything() {
        let loader = EnvLoader::default();
        let vars = loader.load_from([("A_B", "1")]);
        assert_eq!(vars["a_b"], "1");
    }

    #[test]
    fn test_full_key() {
        assert_eq!(
            EnvLoader::new(Some("WAYPOST_".into())).full_key("port"),
            "WAYPOST_PORT"
        );
        assert_eq!(EnvLoader::new(Some("APP".into())).full_key("host"), "APP_HOST");
        assert_eq!(EnvLoader::default().full_key("path"), "PATH");
    }

    #[test]
    fn test_missing_var_uses_default() {
        let loader = EnvLoader::new(Some("WAYPOST_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
        assert_eq!(loader.load_var_or("MISSING_VAR_67890", "fallback"), "fallback");
    }
}
