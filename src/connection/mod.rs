pub mod config;
pub mod factory;

pub use config::{CONFIG_ENV_VAR, ConnectionSettings, ConnectionStrings};
pub use factory::ProviderFactory;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "CLOSED"),
            ConnectionState::Open => write!(f, "OPEN"),
        }
    }
}
