use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use lazy_static::lazy_static;
use log::{info, warn};
use serde::Deserialize;

use crate::core::{DbError, Result};

/// Environment variable naming a JSON file loaded into the global registry on first use.
pub const CONFIG_ENV_VAR: &str = "AMBIENTDB_CONFIG";

/// A named connection string and the provider that understands it.
///
/// JSON form:
///
/// ```json
/// { "name": "orders", "connectionString": "Data Source=orders.db;", "providerName": "sqlite" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub name: String,
    pub connection_string: String,
    pub provider_name: String,
}

impl ConnectionSettings {
    pub fn new(name: &str, connection_string: &str, provider_name: &str) -> Self {
        Self {
            name: name.to_string(),
            connection_string: connection_string.to_string(),
            provider_name: provider_name.to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() {
            return Err("name cannot be empty".to_string());
        }

        if self.connection_string.is_empty() {
            return Err(format!("connection string for '{}' cannot be empty", self.name));
        }

        if self.provider_name.is_empty() {
            return Err(format!("provider name for '{}' cannot be empty", self.name));
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    connection_strings: Vec<ConnectionSettings>,
}

lazy_static! {
    static ref GLOBAL_CONNECTION_STRINGS: ConnectionStrings = ConnectionStrings::from_env();
}

/// Registry resolving logical connection names.
#[derive(Debug, Default)]
pub struct ConnectionStrings {
    entries: RwLock<HashMap<String, ConnectionSettings>>,
}

impl ConnectionStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide registry
    ///
    /// The first call loads the file named by `AMBIENTDB_CONFIG`, if set.
    pub fn global() -> &'static ConnectionStrings {
        &GLOBAL_CONNECTION_STRINGS
    }

    fn from_env() -> Self {
        let strings = Self::new();
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            match strings.load_file(&path) {
                Ok(count) => info!("Loaded {} connection string(s) from {}", count, path),
                Err(e) => warn!("Ignoring {}={}: {}", CONFIG_ENV_VAR, path, e),
            }
        }
        strings
    }

    pub fn register(&self, settings: ConnectionSettings) -> Result<()> {
        settings.validate().map_err(DbError::Configuration)?;
        let mut entries = self.entries.write()?;
        entries.insert(settings.name.clone(), settings);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<Option<ConnectionSettings>> {
        let mut entries = self.entries.write()?;
        Ok(entries.remove(name))
    }

    pub fn get(&self, name: &str) -> Result<Option<ConnectionSettings>> {
        let entries = self.entries.read()?;
        Ok(entries.get(name).cloned())
    }

    /// Like `get`, but a missing name is a configuration error.
    pub fn resolve(&self, name: &str) -> Result<ConnectionSettings> {
        self.get(name)?.ok_or_else(|| {
            DbError::Configuration(format!("Connection string '{}' is not configured", name))
        })
    }

    /// Registers every entry of a `{"connectionStrings": [...]}` document.
    ///
    /// Entries are validated up front; nothing is registered if any is invalid.
    pub fn load_json_str(&self, json: &str) -> Result<usize> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| DbError::Configuration(format!("Invalid configuration: {}", e)))?;

        for settings in &file.connection_strings {
            settings.validate().map_err(DbError::Configuration)?;
        }

        let count = file.connection_strings.len();
        let mut entries = self.entries.write()?;
        for settings in file.connection_strings {
            entries.insert(settings.name.clone(), settings);
        }
        Ok(count)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let json = std::fs::read_to_string(path)?;
        self.load_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ConnectionSettings::new("a", "x.db", "sqlite").validate().is_ok());
        assert!(ConnectionSettings::new("", "x.db", "sqlite").validate().is_err());
        assert!(ConnectionSettings::new("a", "", "sqlite").validate().is_err());
        assert!(ConnectionSettings::new("a", "x.db", "").validate().is_err());
    }

    #[test]
    fn test_register_and_resolve() {
        let strings = ConnectionStrings::new();
        strings
            .register(ConnectionSettings::new("orders", "Data Source=orders.db", "sqlite"))
            .unwrap();

        let resolved = strings.resolve("orders").unwrap();
        assert_eq!(resolved.connection_string, "Data Source=orders.db");
        assert_eq!(resolved.provider_name, "sqlite");

        assert!(matches!(strings.resolve("missing"), Err(DbError::Configuration(_))));
        assert!(strings.register(ConnectionSettings::new("bad", "", "sqlite")).is_err());
    }

    #[test]
    fn test_load_json() {
        let strings = ConnectionStrings::new();
        let count = strings
            .load_json_str(
                r#"{
                    "connectionStrings": [
                        { "name": "main", "connectionString": ":memory:", "providerName": "sqlite" },
                        { "name": "audit", "connectionString": "audit.db", "providerName": "sqlite" }
                    ]
                }"#,
            )
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(strings.resolve("audit").unwrap().connection_string, "audit.db");
        assert_eq!(strings.remove("main").unwrap().map(|s| s.name), Some("main".to_string()));
        assert!(strings.get("main").unwrap().is_none());
    }

    #[test]
    fn test_load_json_is_all_or_nothing() {
        let strings = ConnectionStrings::new();
        let result = strings.load_json_str(
            r#"{ "connectionStrings": [
                { "name": "ok", "connectionString": "a.db", "providerName": "sqlite" },
                { "name": "broken", "connectionString": "", "providerName": "sqlite" }
            ] }"#,
        );

        assert!(matches!(result, Err(DbError::Configuration(_))));
        assert!(strings.get("ok").unwrap().is_none());
        assert!(strings.load_json_str("not json").is_err());
    }
}
