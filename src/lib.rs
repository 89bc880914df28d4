// ============================================================================
// ambientdb Library
// ============================================================================
//
// Driver-agnostic data access with ambient, thread-scoped transactions.
//
// - driver:      Provider / DriverConnection traits, registry, built-in SQLite
// - connection:  named connection strings and cached provider factories
// - command:     command descriptors, parameters and failure diagnostics
// - transaction: root/dependent transactions and TransactionScope
// - facade:      Database, the execution engine
//
// ============================================================================

pub mod command;
pub mod connection;
pub mod core;
pub mod driver;
pub mod facade;
pub mod result;
pub mod transaction;

pub use command::{Command, CommandFailure, CommandKind, Parameter, ParameterDirection};
pub use connection::{ConnectionSettings, ConnectionState, ConnectionStrings, ProviderFactory};
pub use core::{DbError, DbType, Result, Row, Value};
pub use driver::{
    DEFAULT_COMMAND_TIMEOUT, DataAdapter, DriverCommand, DriverConnection, Provider, register_provider,
};
pub use facade::Database;
pub use result::{DataReader, DataRow, DataTable};
pub use transaction::{
    DependentTransaction, IsolationLevel, RootTransaction, Transaction, TransactionId,
    TransactionScope, TransactionState,
};
