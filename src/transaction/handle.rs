use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::{debug, error, warn};

use super::{IsolationLevel, TransactionId, TransactionState};
use crate::connection::ConnectionState;
use crate::core::{DbError, Result};
use crate::driver::DriverConnection;

/// The physical transaction shared by every `Transaction` in an ambient chain.
///
/// Owns the connection the driver transaction was begun on. Rollback is
/// idempotent, commit is allowed once and only while active, and disposal
/// releases the connection exactly once. All three are serialized by the
/// handle's mutex.
pub struct TransactionHandle {
    id: TransactionId,
    isolation_level: IsolationLevel,
    inner: Mutex<HandleInner>,
}

struct HandleInner {
    /// `None` once disposed.
    connection: Option<Box<dyn DriverConnection>>,
    state: TransactionState,
}

impl TransactionHandle {
    /// Opens the connection if needed and begins a driver transaction on it.
    ///
    /// On failure the connection is closed and the driver error returned.
    pub(crate) fn begin(
        mut connection: Box<dyn DriverConnection>,
        isolation_level: IsolationLevel,
    ) -> Result<Self> {
        if connection.state() == ConnectionState::Closed {
            connection.open()?;
        }

        if let Err(e) = connection.begin_transaction(isolation_level) {
            if let Err(close_err) = connection.close() {
                warn!("Failed to close connection after failed begin: {}", close_err);
            }
            return Err(e);
        }

        let id = TransactionId::next();
        debug!("Began {} ({})", id, isolation_level);

        Ok(Self {
            id,
            isolation_level,
            inner: Mutex::new(HandleInner {
                connection: Some(connection),
                state: TransactionState::Active,
            }),
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn is_rolled_back(&self) -> bool {
        self.state() == TransactionState::RolledBack
    }

    /// True once the connection has been released.
    pub fn is_disposed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connection
            .is_none()
    }

    /// Rolls back the driver transaction.
    ///
    /// A no-op once the handle is committed or rolled back. The handle is
    /// marked rolled back even when the driver call fails.
    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state.is_terminal() {
            return Ok(());
        }
        inner.state = TransactionState::RolledBack;

        match inner.connection.as_mut() {
            Some(connection) => {
                debug!("Rolling back {}", self.id);
                connection.rollback()
            }
            None => Ok(()),
        }
    }

    /// Commits the driver transaction. A failed commit leaves the handle
    /// active, so disposal still rolls it back.
    pub(crate) fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        match inner.state {
            TransactionState::Active => {}
            TransactionState::Committed => {
                return Err(DbError::Programming(format!(
                    "Cannot commit: transaction {} is already committed",
                    self.id
                )));
            }
            TransactionState::RolledBack => {
                return Err(DbError::Programming(format!(
                    "Cannot commit: transaction {} has been rolled back",
                    self.id
                )));
            }
        }

        let connection = inner.connection.as_mut().ok_or_else(|| {
            DbError::Programming(format!("Cannot commit: transaction {} is disposed", self.id))
        })?;
        connection.commit()?;
        inner.state = TransactionState::Committed;
        debug!("Committed {}", self.id);
        Ok(())
    }

    /// Releases the connection; later calls are no-ops.
    pub(crate) fn dispose(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        release(self.id, &mut inner)
    }

    /// Runs `f` on the transaction's connection.
    pub(crate) fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn DriverConnection) -> Result<T>,
    {
        let mut inner = self.inner.lock()?;
        if !inner.state.is_active() {
            return Err(DbError::Programming(format!(
                "Cannot execute: transaction {} is {}",
                self.id, inner.state
            )));
        }

        let connection = inner.connection.as_mut().ok_or_else(|| {
            DbError::Programming(format!("Cannot execute: transaction {} is disposed", self.id))
        })?;
        f(connection.as_mut())
    }
}

fn release(id: TransactionId, inner: &mut HandleInner) -> Result<()> {
    let Some(mut connection) = inner.connection.take() else {
        return Ok(());
    };

    let rolled_back = if inner.state.is_active() {
        warn!("Disposing {} while still active; rolling back", id);
        inner.state = TransactionState::RolledBack;
        connection.rollback()
    } else {
        Ok(())
    };

    let closed = connection.close();
    debug!("Disposed {}", id);
    rolled_back.and(closed)
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = release(self.id, inner) {
            error!("Failed to release {}: {}", self.id, e);
        }
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("isolation_level", &self.isolation_level)
            .field("state", &self.state())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCommand, SqliteConnection};

    fn begin() -> TransactionHandle {
        let conn = SqliteConnection::new(":memory:").unwrap();
        TransactionHandle::begin(Box::new(conn), IsolationLevel::Unspecified).unwrap()
    }

    fn sql(text: &str) -> DriverCommand {
        DriverCommand {
            text: text.into(),
            ..DriverCommand::default()
        }
    }

    #[test]
    fn test_begin_opens_connection() {
        let handle = begin();
        assert_eq!(handle.state(), TransactionState::Active);
        assert!(!handle.is_disposed());

        let n = handle
            .with_connection(|c| c.execute_scalar(&sql("SELECT 7")))
            .unwrap();
        assert_eq!(n, Some(crate::core::Value::Integer(7)));
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let handle = begin();
        handle.rollback().unwrap();
        handle.rollback().unwrap();
        assert!(handle.is_rolled_back());
    }

    #[test]
    fn test_commit_rules() {
        let handle = begin();
        handle.commit().unwrap();
        assert_eq!(handle.state(), TransactionState::Committed);
        assert!(handle.commit().unwrap_err().is_programming());
        // Rollback after commit is a no-op
        handle.rollback().unwrap();
        assert_eq!(handle.state(), TransactionState::Committed);

        let handle = begin();
        handle.rollback().unwrap();
        assert!(handle.commit().unwrap_err().is_programming());
    }

    #[test]
    fn test_dispose_rolls_back_active_handle() {
        let handle = begin();
        handle.dispose().unwrap();
        handle.dispose().unwrap();
        assert!(handle.is_disposed());
        assert!(handle.is_rolled_back());

        let err = handle.with_connection(|_| Ok(())).unwrap_err();
        assert!(err.is_programming());
    }

    #[test]
    fn test_unsupported_isolation_level() {
        let conn = SqliteConnection::new(":memory:").unwrap();
        let err = TransactionHandle::begin(Box::new(conn), IsolationLevel::Snapshot).unwrap_err();
        assert!(matches!(err, DbError::Driver(_)));
    }
}
