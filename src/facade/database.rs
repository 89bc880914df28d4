use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::command::{Command, CommandFailure, Parameter};
use crate::connection::ProviderFactory;
use crate::core::{DbError, DbType, Result, Value};
use crate::driver::{
    ConnectionGuard, DEFAULT_COMMAND_TIMEOUT, DataAdapter, DriverCommand, DriverConnection,
};
use crate::result::{DataReader, DataRow, DataTable};
use crate::transaction::{IsolationLevel, Transaction, TransactionScope};

/// Entry point for running commands against one configured database.
///
/// Every `execute_*` call joins the calling thread's ambient transaction when
/// one is active and runs on its connection. Otherwise it opens a private
/// connection for the duration of the call.
///
/// ```no_run
/// use ambientdb::{Database, Parameter};
///
/// # fn main() -> ambientdb::Result<()> {
/// let db = Database::with_connection_string("Data Source=app.db;", "sqlite")?;
/// db.atomic(|db| {
///     db.execute_non_query(("INSERT INTO users (name) VALUES (@name)", vec![Parameter::new("name", "alice")]))?;
///     db.execute_non_query("UPDATE stats SET users = users + 1")
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    factory: Arc<ProviderFactory>,
    command_timeout: Duration,
}

impl Database {
    /// Database for a logical name registered in `ConnectionStrings::global()`.
    pub fn named(name: &str) -> Result<Self> {
        Ok(Self::from_factory(ProviderFactory::named(name)?))
    }

    /// Database configured under the short name of `T` (`app::repo::Orders` -> `"Orders"`).
    pub fn for_type<T: ?Sized>() -> Result<Self> {
        Self::named(short_type_name::<T>())
    }

    pub fn with_connection_string(connection_string: &str, provider_name: &str) -> Result<Self> {
        Ok(Self::from_factory(ProviderFactory::for_connection_string(
            connection_string,
            provider_name,
        )?))
    }

    pub fn from_factory(factory: Arc<ProviderFactory>) -> Self {
        Self {
            factory,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn provider_factory(&self) -> &Arc<ProviderFactory> {
        &self.factory
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Timeout for commands that do not carry their own.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    /// A new, closed connection.
    pub fn create_connection(&self) -> Result<Box<dyn DriverConnection>> {
        self.factory.create_connection()
    }

    /// Driver command loaded with the command's text, kind, parameters and
    /// effective timeout.
    pub fn create_command(&self, command: &Command) -> DriverCommand {
        let mut driver_command = self.factory.create_command();
        driver_command.text = command.command_text().to_string();
        driver_command.kind = command.kind();
        driver_command.timeout = command.timeout().unwrap_or(self.command_timeout);
        driver_command.parameters = command.parameters().to_vec();
        driver_command
    }

    pub fn create_adapter(&self, command: &Command) -> DataAdapter {
        self.factory
            .create_data_adapter()
            .with_select_command(self.create_command(command))
    }

    /// Input parameter whose type is inferred from `value`.
    pub fn create_parameter(&self, name: &str, value: impl Into<Value>) -> Parameter {
        let value = value.into();
        let db_type = DbType::infer(&value);
        self.create_typed_parameter(name, value, db_type)
    }

    pub fn create_typed_parameter(&self, name: &str, value: impl Into<Value>, db_type: DbType) -> Parameter {
        let mut parameter = self.factory.create_parameter();
        parameter.name = name.to_string();
        parameter.value = value.into();
        parameter.db_type = db_type;
        parameter
    }

    // ========================================================================
    // Transaction scopes
    // ========================================================================

    /// Begins a root transaction on a new connection, or joins the ambient one.
    pub fn transaction_scope(&self) -> Result<TransactionScope> {
        self.transaction_scope_with(IsolationLevel::Unspecified)
    }

    pub fn transaction_scope_with(&self, isolation_level: IsolationLevel) -> Result<TransactionScope> {
        TransactionScope::enter(self.create_connection()?, isolation_level)
    }

    /// Runs `f` inside a transaction scope, completing it only when `f` succeeds.
    pub fn atomic<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<DbError>,
    {
        let mut scope = self.transaction_scope()?;
        let value = f(self)?;
        scope.complete()?;
        scope.close()?;
        Ok(value)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs a statement and returns the number of affected rows.
    pub fn execute_non_query(&self, command: impl Into<Command>) -> Result<u64> {
        let command = command.into();
        let driver_command = self.create_command(&command);
        self.run(&command, |conn| conn.execute_non_query(&driver_command))
    }

    /// First column of the first row, or `None` for an empty result.
    pub fn execute_scalar(&self, command: impl Into<Command>) -> Result<Option<Value>> {
        let command = command.into();
        let driver_command = self.create_command(&command);
        self.run(&command, |conn| conn.execute_scalar(&driver_command))
    }

    pub fn execute_table(&self, command: impl Into<Command>) -> Result<DataTable> {
        let command = command.into();
        let adapter = self.create_adapter(&command);
        self.run(&command, |conn| adapter.fill(conn))
    }

    pub fn execute_row(&self, command: impl Into<Command>) -> Result<Option<DataRow>> {
        Ok(self.execute_table(command)?.into_first_row())
    }

    /// Outside a transaction the reader keeps its private connection open
    /// until it is exhausted, closed or dropped.
    pub fn execute_reader(&self, command: impl Into<Command>) -> Result<DataReader> {
        let command = command.into();
        check_parameters(&command)?;
        let driver_command = self.create_command(&command);

        let reader = match Transaction::current() {
            Some(transaction) => {
                debug!("Reader joins {}", transaction.id());
                transaction
                    .handle()
                    .with_connection(|conn| conn.execute_query(&driver_command))
                    .map(|table| DataReader::new(table, None))
            }
            None => self.open_private().and_then(|mut guard| {
                let table = guard.connection_mut().execute_query(&driver_command)?;
                Ok(DataReader::new(table, Some(guard)))
            }),
        };

        reader.map_err(|e| CommandFailure::wrap(e, &command))
    }

    fn run<T, F>(&self, command: &Command, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn DriverConnection) -> Result<T>,
    {
        check_parameters(command)?;
        let result = match Transaction::current() {
            Some(transaction) => {
                debug!("Executing in {}: {}", transaction.id(), command.command_text());
                transaction.handle().with_connection(f)
            }
            None => {
                debug!("Executing on private connection: {}", command.command_text());
                self.open_private()
                    .and_then(|mut guard| f(guard.connection_mut()))
            }
        };

        result.map_err(|e| CommandFailure::wrap(e, command))
    }

    fn open_private(&self) -> Result<ConnectionGuard> {
        ConnectionGuard::open(self.factory.create_connection()?)
    }
}

fn check_parameters(command: &Command) -> Result<()> {
    for parameter in command.parameters() {
        parameter.validate().map_err(DbError::Programming)?;
    }
    Ok(())
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::driver::SQLITE_PROVIDER_NAME;

    struct Orders;
    #[allow(dead_code)]
    struct Wrapper<T>(T);

    fn memory() -> Database {
        Database::with_connection_string(":memory:", SQLITE_PROVIDER_NAME).unwrap()
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Orders>(), "Orders");
        assert_eq!(short_type_name::<Wrapper<Orders>>(), "Wrapper");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_create_command_uses_timeout_override() {
        let mut db = memory();
        db.set_command_timeout(Duration::from_secs(5));

        let plain = db.create_command(&Command::sql("SELECT 1"));
        assert_eq!(plain.timeout, Duration::from_secs(5));
        assert_eq!(plain.kind, CommandKind::Text);

        let with_override = Command::sql("SELECT 1").with_timeout(Duration::from_millis(250));
        assert_eq!(db.create_command(&with_override).timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_create_parameter_infers_type() {
        let db = memory();
        assert_eq!(db.create_parameter("@id", 7i64).db_type, DbType::Int64);

        let typed = db.create_typed_parameter("@raw", vec![0u8, 1], DbType::Binary);
        assert_eq!(typed.db_type, DbType::Binary);
        assert_eq!(typed.value, Value::Blob(vec![0, 1]));
    }

    #[test]
    fn test_mismatched_parameter_type_is_rejected() {
        let db = memory();
        let mismatched = db.create_typed_parameter("@raw", "x", DbType::Binary);

        let err = db
            .execute_scalar(Command::sql("SELECT @raw").with_parameter(mismatched.clone()))
            .unwrap_err();
        assert!(err.is_programming());
        assert!(err.command_failure().is_none());

        let err = db
            .execute_reader(Command::sql("SELECT @raw").with_parameter(mismatched))
            .err()
            .unwrap();
        assert!(err.is_programming());

        let widened = db.create_typed_parameter("@n", 3i64, DbType::Double);
        let value = db.execute_scalar(Command::sql("SELECT @n").with_parameter(widened)).unwrap();
        assert_eq!(value, Some(Value::Integer(3)));
    }

    #[test]
    fn test_private_connections_do_not_share_memory_database() {
        let db = memory();
        db.execute_non_query("CREATE TABLE t (id INTEGER)").unwrap();

        // Each call opens its own :memory: database
        let err = db.execute_scalar("SELECT COUNT(*) FROM t").unwrap_err();
        assert!(err.command_failure().is_some());
    }

    #[test]
    fn test_scope_shares_one_connection() {
        let db = memory();
        db.atomic(|db| -> Result<()> {
            db.execute_non_query("CREATE TABLE t (id INTEGER)")?;
            db.execute_non_query("INSERT INTO t VALUES (1), (2)")?;
            let count = db.execute_scalar("SELECT COUNT(*) FROM t")?;
            assert_eq!(count, Some(Value::Integer(2)));

            let row = db.execute_row("SELECT id FROM t ORDER BY id DESC")?.unwrap();
            assert_eq!(row.get_by_name("ID"), Some(&Value::Integer(2)));

            let reader = db.execute_reader("SELECT id FROM t")?;
            assert!(!reader.holds_connection());
            assert_eq!(reader.count(), 2);
            Ok(())
        })
        .unwrap();
    }
}
