use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use log::debug;

use super::{Provider, SqliteProvider};
use crate::core::{DbError, Result};

lazy_static! {
    static ref PROVIDERS: RwLock<HashMap<String, Arc<dyn Provider>>> = RwLock::new(builtin_providers());
}

fn builtin_providers() -> HashMap<String, Arc<dyn Provider>> {
    let sqlite: Arc<dyn Provider> = Arc::new(SqliteProvider);
    let mut providers = HashMap::new();
    providers.insert(sqlite.name().to_string(), sqlite);
    providers
}

/// Registers a provider under its invariant name, replacing any previous one.
pub fn register_provider(provider: Arc<dyn Provider>) -> Result<()> {
    let name = provider.name().to_string();
    if name.is_empty() {
        return Err(DbError::Configuration("provider name cannot be empty".into()));
    }

    let mut providers = PROVIDERS.write()?;
    if providers.insert(name.clone(), provider).is_some() {
        debug!("Replaced provider '{}'", name);
    } else {
        debug!("Registered provider '{}'", name);
    }
    Ok(())
}

/// Looks up a provider by invariant name.
pub fn provider(name: &str) -> Result<Arc<dyn Provider>> {
    let providers = PROVIDERS.read()?;
    providers
        .get(name)
        .cloned()
        .ok_or_else(|| DbError::Configuration(format!("No provider registered as '{}'", name)))
}

pub fn registered_providers() -> Result<Vec<String>> {
    let providers = PROVIDERS.read()?;
    let mut names: Vec<String> = providers.keys().cloned().collect();
    names.sort();
    Ok(names)
}
