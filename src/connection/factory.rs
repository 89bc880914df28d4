use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use log::debug;

use super::ConnectionStrings;
use crate::command::Parameter;
use crate::core::{DbError, Result};
use crate::driver::{self, DataAdapter, DriverCommand, DriverConnection, Provider};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Named(String),
    Explicit {
        connection_string: String,
        provider_name: String,
    },
}

lazy_static! {
    static ref FACTORY_CACHE: Mutex<HashMap<CacheKey, Arc<ProviderFactory>>> = Mutex::new(HashMap::new());
}

/// A provider bound to one connection string.
///
/// Factories are cached process-wide; the returned instances are immutable and
/// safe to share between threads.
pub struct ProviderFactory {
    connection_string: String,
    provider_name: String,
    provider: Arc<dyn Provider>,
}

impl ProviderFactory {
    /// Factory for a logical name resolved through `ConnectionStrings::global()`.
    ///
    /// The first successful lookup is cached; later changes to the registry
    /// are not observed until `clear_cache` is called.
    pub fn named(name: &str) -> Result<Arc<Self>> {
        Self::get_or_create(CacheKey::Named(name.to_string()), || {
            let settings = ConnectionStrings::global().resolve(name)?;
            Self::new(settings.connection_string, settings.provider_name)
        })
    }

    /// Factory for an explicit connection string / provider pair.
    pub fn for_connection_string(connection_string: &str, provider_name: &str) -> Result<Arc<Self>> {
        let key = CacheKey::Explicit {
            connection_string: connection_string.to_string(),
            provider_name: provider_name.to_string(),
        };
        Self::get_or_create(key, || {
            Self::new(connection_string.to_string(), provider_name.to_string())
        })
    }

    /// Drops every cached factory.
    pub fn clear_cache() -> Result<()> {
        FACTORY_CACHE.lock()?.clear();
        Ok(())
    }

    fn get_or_create<F>(key: CacheKey, create: F) -> Result<Arc<Self>>
    where
        F: FnOnce() -> Result<Self>,
    {
        let mut cache = FACTORY_CACHE.lock()?;
        if let Some(factory) = cache.get(&key) {
            return Ok(Arc::clone(factory));
        }

        let factory = Arc::new(create()?);
        debug!("Cached provider factory {:?} -> '{}'", key, factory.provider_name);
        cache.insert(key, Arc::clone(&factory));
        Ok(factory)
    }

    fn new(connection_string: String, provider_name: String) -> Result<Self> {
        if connection_string.is_empty() {
            return Err(DbError::Configuration("connection string cannot be empty".into()));
        }
        if provider_name.is_empty() {
            return Err(DbError::Configuration("provider name cannot be empty".into()));
        }

        let provider = driver::provider(&provider_name)?;
        Ok(Self {
            connection_string,
            provider_name,
            provider,
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// A new, closed connection bound to this factory's connection string.
    pub fn create_connection(&self) -> Result<Box<dyn DriverConnection>> {
        self.provider.create_connection(&self.connection_string)
    }

    pub fn create_command(&self) -> DriverCommand {
        self.provider.create_command()
    }

    pub fn create_parameter(&self) -> Parameter {
        self.provider.create_parameter()
    }

    pub fn create_data_adapter(&self) -> DataAdapter {
        self.provider.create_data_adapter()
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}
