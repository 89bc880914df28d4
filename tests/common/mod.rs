//! Recording driver shared by the integration tests.
//!
//! Every connection appends to a `Journal` so tests can assert exactly which
//! driver calls the execution engine and the scopes made. Failures can be
//! injected: commands whose text starts with `FAIL`, connection strings
//! containing `unreachable`, and the `Chaos` isolation level.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ambientdb::{
    ConnectionState, DataTable, Database, DbError, DriverCommand, DriverConnection, IsolationLevel,
    Provider, Result, Value, register_provider,
};

#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
}

impl Journal {
    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events equal to `event` (e.g. `"open"`, `"commit"`).
    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("execute ").map(String::from))
            .collect()
    }
}

pub struct RecordingProvider {
    name: String,
    journal: Arc<Journal>,
}

impl RecordingProvider {
    /// Registers a provider under `name` and returns its journal.
    ///
    /// Tests run in parallel against one process-wide registry, so every test
    /// should pick its own name.
    pub fn install(name: &str) -> Arc<Journal> {
        let journal = Arc::new(Journal::default());
        register_provider(Arc::new(RecordingProvider {
            name: name.to_string(),
            journal: Arc::clone(&journal),
        }))
        .unwrap();
        journal
    }
}

impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        Ok(Box::new(RecordingConnection {
            connection_string: connection_string.to_string(),
            journal: Arc::clone(&self.journal),
            open: false,
        }))
    }
}

struct RecordingConnection {
    connection_string: String,
    journal: Arc<Journal>,
    open: bool,
}

impl RecordingConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::Driver("recording: connection is closed".into()))
        }
    }

    fn execute(&self, command: &DriverCommand) -> Result<()> {
        self.ensure_open()?;
        self.journal.record(format!("execute {}", command.text));
        if command.text.starts_with("FAIL") {
            return Err(DbError::Driver("recording: injected failure".into()));
        }
        Ok(())
    }
}

impl DriverConnection for RecordingConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        if self.open {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.connection_string.contains("unreachable") {
            return Err(DbError::Driver("recording: host unreachable".into()));
        }
        self.journal.record("open");
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.journal.record("close");
        self.open = false;
        Ok(())
    }

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<()> {
        self.ensure_open()?;
        if isolation_level == IsolationLevel::Chaos {
            return Err(DbError::Driver("recording: CHAOS is not supported".into()));
        }
        self.journal.record("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.journal.record("commit");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.journal.record("rollback");
        Ok(())
    }

    fn execute_non_query(&mut self, command: &DriverCommand) -> Result<u64> {
        self.execute(command)?;
        Ok(1)
    }

    fn execute_query(&mut self, command: &DriverCommand) -> Result<DataTable> {
        self.execute(command)?;
        let rows = (1..=3).map(|n| vec![Value::Integer(n)]).collect();
        Ok(DataTable::new(vec!["n".to_string()], rows))
    }
}

/// A database backed by a freshly registered recording provider.
pub fn recording_database(provider_name: &str) -> (Database, Arc<Journal>) {
    let journal = RecordingProvider::install(provider_name);
    let db = Database::with_connection_string("recording://localhost/test", provider_name).unwrap();
    (db, journal)
}
