// ============================================================================
// Driver Abstraction
// ============================================================================
//
// A `Provider` is the per-backend factory for connections, commands,
// parameters and data adapters. Everything above this module talks to a
// database only through `Provider` and `DriverConnection`, so new backends
// plug in by implementing these two traits and registering the provider.
//
// ============================================================================

pub mod registry;
pub mod sqlite;

pub use registry::{provider, register_provider, registered_providers};
pub use sqlite::{SQLITE_PROVIDER_NAME, SqliteConnection, SqliteProvider};

use std::time::Duration;

use log::warn;

use crate::command::{CommandKind, Parameter};
use crate::connection::ConnectionState;
use crate::core::{DbError, Result, Value};
use crate::result::DataTable;
use crate::transaction::IsolationLevel;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Factory for one database backend.
pub trait Provider: Send + Sync {
    /// Invariant name the provider is registered under (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Creates a closed connection for the given connection string.
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>>;

    fn create_command(&self) -> DriverCommand {
        DriverCommand::default()
    }

    fn create_parameter(&self) -> Parameter {
        Parameter::default()
    }

    fn create_data_adapter(&self) -> DataAdapter {
        DataAdapter::new()
    }
}

/// A single physical connection. At most one driver transaction is active on
/// a connection at a time; commands run inside it while it is open.
pub trait DriverConnection: Send {
    fn connection_string(&self) -> &str;

    fn state(&self) -> ConnectionState;

    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Runs a statement and returns the number of affected rows.
    fn execute_non_query(&mut self, command: &DriverCommand) -> Result<u64>;

    /// Runs a query and materializes its result set.
    fn execute_query(&mut self, command: &DriverCommand) -> Result<DataTable>;

    /// First column of the first row; `None` when the query yields no rows.
    fn execute_scalar(&mut self, command: &DriverCommand) -> Result<Option<Value>> {
        Ok(self.execute_query(command)?.scalar())
    }
}

/// A driver-level command ready to run on a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCommand {
    pub text: String,
    pub kind: CommandKind,
    pub timeout: Duration,
    pub parameters: Vec<Parameter>,
}

impl Default for DriverCommand {
    fn default() -> Self {
        Self {
            text: String::new(),
            kind: CommandKind::Text,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            parameters: Vec::new(),
        }
    }
}

/// Fills a `DataTable` from its select command.
#[derive(Debug, Clone, Default)]
pub struct DataAdapter {
    select_command: Option<DriverCommand>,
}

impl DataAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select_command(mut self, command: DriverCommand) -> Self {
        self.select_command = Some(command);
        self
    }

    pub fn select_command(&self) -> Option<&DriverCommand> {
        self.select_command.as_ref()
    }

    pub fn fill(&self, connection: &mut dyn DriverConnection) -> Result<DataTable> {
        let command = self
            .select_command
            .as_ref()
            .ok_or_else(|| DbError::Programming("data adapter has no select command".into()))?;
        connection.execute_query(command)
    }
}

/// Owns a private (non-transactional) connection and closes it on drop.
pub(crate) struct ConnectionGuard {
    connection: Box<dyn DriverConnection>,
}

impl ConnectionGuard {
    pub(crate) fn open(mut connection: Box<dyn DriverConnection>) -> Result<Self> {
        if connection.state() == ConnectionState::Closed {
            connection.open()?;
        }
        Ok(Self { connection })
    }

    pub(crate) fn connection_mut(&mut self) -> &mut dyn DriverConnection {
        self.connection.as_mut()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.connection.state() == ConnectionState::Closed {
            return;
        }
        if let Err(e) = self.connection.close() {
            warn!("Failed to close private connection: {}", e);
        }
    }
}
