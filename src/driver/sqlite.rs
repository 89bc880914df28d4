//! Built-in SQLite provider backed by `rusqlite`.
//!
//! Connection strings are either ADO-style key/value pairs
//! (`Data Source=app.db;`) or a bare path. `:memory:` opens a private
//! in-memory database per connection.

use log::debug;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};

use super::{DriverCommand, DriverConnection, Provider};
use crate::command::{CommandKind, Parameter};
use crate::connection::ConnectionState;
use crate::core::{DbError, Result, Value};
use crate::result::DataTable;
use crate::transaction::IsolationLevel;

pub const SQLITE_PROVIDER_NAME: &str = "sqlite";

const DATA_SOURCE_KEYS: [&str; 3] = ["data source", "datasource", "filename"];
const PARAMETER_PREFIXES: [char; 3] = ['@', ':', '$'];

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProvider;

impl Provider for SqliteProvider {
    fn name(&self) -> &str {
        SQLITE_PROVIDER_NAME
    }

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        Ok(Box::new(SqliteConnection::new(connection_string)?))
    }
}

pub struct SqliteConnection {
    connection_string: String,
    data_source: String,
    conn: Option<Connection>,
}

impl SqliteConnection {
    pub fn new(connection_string: &str) -> Result<Self> {
        Ok(Self {
            connection_string: connection_string.to_string(),
            data_source: parse_data_source(connection_string)?,
            conn: None,
        })
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    fn inner(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbError::Driver("sqlite: connection is not open".into()))
    }

    fn prepare<'c>(conn: &'c Connection, command: &DriverCommand) -> Result<Statement<'c>> {
        if command.kind == CommandKind::StoredProcedure {
            return Err(DbError::Driver(
                "sqlite: stored procedures are not supported".into(),
            ));
        }
        conn.busy_timeout(command.timeout)?;
        let mut stmt = conn.prepare(&command.text)?;
        bind_parameters(&mut stmt, &command.parameters)?;
        Ok(stmt)
    }
}

impl DriverConnection for SqliteConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = if self.data_source == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.data_source)?
        };
        debug!("sqlite: opened '{}'", self.data_source);
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DbError::from(e))?;
            debug!("sqlite: closed '{}'", self.data_source);
        }
        Ok(())
    }

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<()> {
        let statement = begin_statement(isolation_level)?;
        self.inner()?.execute_batch(statement)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.inner()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn execute_non_query(&mut self, command: &DriverCommand) -> Result<u64> {
        let conn = self.inner()?;
        let mut stmt = Self::prepare(conn, command)?;
        Ok(stmt.raw_execute()? as u64)
    }

    fn execute_query(&mut self, command: &DriverCommand) -> Result<DataTable> {
        let conn = self.inner()?;
        let mut stmt = Self::prepare(conn, command)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(Value::from(row.get_ref(i)?));
            }
            rows.push(values);
        }
        Ok(DataTable::new(columns, rows))
    }
}

/// SQLite is serializable at every level; the levels only pick how eagerly
/// the write lock is taken.
fn begin_statement(isolation_level: IsolationLevel) -> Result<&'static str> {
    match isolation_level {
        IsolationLevel::Unspecified
        | IsolationLevel::ReadUncommitted
        | IsolationLevel::ReadCommitted => Ok("BEGIN DEFERRED"),
        IsolationLevel::RepeatableRead => Ok("BEGIN IMMEDIATE"),
        IsolationLevel::Serializable => Ok("BEGIN EXCLUSIVE"),
        IsolationLevel::Chaos | IsolationLevel::Snapshot => Err(DbError::Driver(format!(
            "sqlite: isolation level {} is not supported",
            isolation_level
        ))),
    }
}

fn parse_data_source(connection_string: &str) -> Result<String> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(DbError::Configuration(
            "sqlite: connection string is empty".into(),
        ));
    }
    if !trimmed.contains('=') {
        return Ok(trimmed.to_string());
    }

    for pair in trimmed.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if DATA_SOURCE_KEYS.contains(&key.as_str()) {
            return Ok(value.trim().to_string());
        }
    }

    Err(DbError::Configuration(format!(
        "sqlite: no Data Source in connection string '{}'",
        trimmed
    )))
}

fn bind_parameters(stmt: &mut Statement<'_>, parameters: &[Parameter]) -> Result<()> {
    let inputs = parameters.iter().filter(|p| p.direction.is_input());
    for (position, parameter) in inputs.enumerate() {
        let index = match parameter_index(stmt, &parameter.name)? {
            Some(index) => index,
            None if parameter.name.is_empty() => position + 1,
            None => {
                return Err(DbError::Driver(format!(
                    "sqlite: statement has no parameter named '{}'",
                    parameter.name
                )));
            }
        };
        stmt.raw_bind_parameter(index, &parameter.value)?;
    }
    Ok(())
}

fn parameter_index(stmt: &Statement<'_>, name: &str) -> Result<Option<usize>> {
    if name.is_empty() {
        return Ok(None);
    }
    if name.starts_with(&PARAMETER_PREFIXES[..]) {
        return Ok(stmt.parameter_index(name)?);
    }
    for prefix in PARAMETER_PREFIXES {
        if let Some(index) = stmt.parameter_index(&format!("{}{}", prefix, name))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Driver(format!("sqlite: {}", err))
    }
}
