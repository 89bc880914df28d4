use std::marker::PhantomData;

use log::{debug, error, warn};

use super::{IsolationLevel, RootTransaction, Transaction, ambient};
use crate::core::{DbError, Result};
use crate::driver::DriverConnection;

/// Scoped ambient transaction.
///
/// Entering a scope on a thread with no ambient transaction begins a root
/// transaction on the given connection; entering inside another scope joins
/// the existing transaction and drops the given connection. Leaving the scope
/// (via [`close`](Self::close) or drop) restores the previous ambient
/// transaction, rolls back unless [`complete`](Self::complete) was called and,
/// for the root scope, commits or disposes.
///
/// ```no_run
/// # use ambientdb::{Database, Result};
/// # fn run(db: &Database) -> Result<()> {
/// let mut scope = db.transaction_scope()?;
/// db.execute_non_query("INSERT INTO audit (event) VALUES ('login')")?;
/// scope.complete()?;
/// scope.close()
/// # }
/// ```
///
/// Scopes are bound to the thread that entered them.
#[derive(Debug)]
#[must_use = "a scope that is dropped immediately rolls back"]
pub struct TransactionScope {
    saved: Option<Transaction>,
    transaction: Option<Transaction>,
    completed: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl TransactionScope {
    pub fn new(connection: Box<dyn DriverConnection>) -> Result<Self> {
        Self::enter(connection, IsolationLevel::Unspecified)
    }

    /// Begins or joins the ambient transaction.
    ///
    /// An ambient transaction whose handle is already disposed is not joined;
    /// the scope begins a new root and clears it on exit. On error the ambient
    /// transaction is left untouched.
    pub fn enter(connection: Box<dyn DriverConnection>, isolation_level: IsolationLevel) -> Result<Self> {
        let saved = Transaction::current().filter(|t| {
            let disposed = t.handle().is_disposed();
            if disposed {
                warn!("Ignoring disposed ambient transaction {}", t.id());
            }
            !disposed
        });

        let transaction = match &saved {
            None => Transaction::Root(RootTransaction::begin(connection, isolation_level)?),
            Some(parent) => {
                drop(connection);
                if isolation_level != IsolationLevel::Unspecified
                    && isolation_level != parent.handle().isolation_level()
                {
                    debug!(
                        "Nested scope requested {} but joins {} at {}",
                        isolation_level,
                        parent.id(),
                        parent.handle().isolation_level()
                    );
                }
                Transaction::Dependent(parent.dependent_clone())
            }
        };

        ambient::replace(Some(transaction.clone()));
        debug!("Entered scope for {} (depth {})", transaction.id(), transaction.depth());

        Ok(Self {
            saved,
            transaction: Some(transaction),
            completed: false,
            _thread_bound: PhantomData,
        })
    }

    /// Votes to commit. Only the root scope actually commits, on exit.
    pub fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Err(DbError::Programming(
                "complete() has already been called on this scope".into(),
            ));
        }
        self.completed = true;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.transaction.as_ref().is_some_and(Transaction::is_root)
    }

    /// Leaves the scope and reports commit or rollback failures.
    ///
    /// Leaving a scope while a scope entered after it is still open is a
    /// programming error: the transaction is rolled back (and disposed, for a
    /// root) and the error returned.
    pub fn close(mut self) -> Result<()> {
        self.exit()
    }

    fn exit(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Ok(());
        };

        let displaced = ambient::replace(self.saved.take());
        let in_order = displaced.as_ref().is_some_and(|t| t.ptr_eq(&transaction));
        if !in_order {
            warn!(
                "Scope for {} (depth {}) exited out of order; ambient slot held {:?}",
                transaction.id(),
                transaction.depth(),
                displaced.as_ref().map(|t| (t.id(), t.depth()))
            );
        }

        let commit = self.completed && in_order;
        let mut result = Ok(());
        if !commit {
            debug!("Scope for {} not committing; rolling back", transaction.id());
            result = transaction.rollback();
        }

        if let Transaction::Root(root) = &transaction {
            if commit {
                result = root.commit();
            }
            result = result.and(root.dispose());
        }

        if in_order {
            return result;
        }
        result.and(Err(DbError::Programming(format!(
            "Scope for {} (depth {}) was left while a scope entered after it was still open",
            transaction.id(),
            transaction.depth()
        ))))
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            error!("Error while leaving transaction scope: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SqliteConnection;
    use std::sync::Arc;

    fn memory() -> Box<dyn DriverConnection> {
        Box::new(SqliteConnection::new(":memory:").unwrap())
    }

    #[test]
    fn test_root_scope_installs_and_restores() {
        let scope = TransactionScope::new(memory()).unwrap();
        assert!(scope.is_root());

        let ambient = Transaction::current().unwrap();
        assert!(ambient.ptr_eq(scope.transaction().unwrap()));

        scope.close().unwrap();
        assert!(Transaction::current().is_none());
        assert!(ambient.handle().is_disposed());
        assert!(ambient.handle().is_rolled_back());
    }

    #[test]
    fn test_nested_scope_joins_outer() {
        let mut outer = TransactionScope::new(memory()).unwrap();
        let root_id = Transaction::current().unwrap().id();

        {
            let mut inner = TransactionScope::new(memory()).unwrap();
            assert!(!inner.is_root());
            assert_eq!(Transaction::current().unwrap().id(), root_id);
            assert_eq!(Transaction::current().unwrap().depth(), 1);
            inner.complete().unwrap();
            inner.close().unwrap();
        }

        let ambient = Transaction::current().unwrap();
        assert!(ambient.is_root());
        assert!(!ambient.is_completed());

        outer.complete().unwrap();
        outer.close().unwrap();
        assert_eq!(ambient.handle().state(), crate::transaction::TransactionState::Committed);
    }

    #[test]
    fn test_complete_twice_is_programming_error() {
        let mut scope = TransactionScope::new(memory()).unwrap();
        scope.complete().unwrap();
        assert!(scope.complete().unwrap_err().is_programming());
        scope.close().unwrap();
    }

    #[test]
    fn test_failed_enter_leaves_slot_untouched() {
        let result = TransactionScope::enter(memory(), IsolationLevel::Chaos);
        assert!(matches!(result, Err(DbError::Driver(_))));
        assert!(Transaction::current().is_none());
    }

    #[test]
    fn test_out_of_order_exit_is_programming_error() {
        let mut outer = TransactionScope::new(memory()).unwrap();
        let inner = TransactionScope::new(memory()).unwrap();
        let root = Arc::clone(Transaction::current().unwrap().handle());

        outer.complete().unwrap();
        assert!(outer.close().unwrap_err().is_programming());
        assert!(root.is_rolled_back());
        assert!(root.is_disposed());

        // The inner scope puts the dead root back; it is not joined again
        assert!(inner.close().unwrap_err().is_programming());
        assert!(Transaction::current().unwrap().handle().is_disposed());

        let fresh = TransactionScope::new(memory()).unwrap();
        assert!(fresh.is_root());
        assert!(!Arc::ptr_eq(fresh.transaction().unwrap().handle(), &root));
        fresh.close().unwrap();
        assert!(Transaction::current().is_none());
    }

    #[test]
    fn test_drop_rolls_back() {
        let handle = {
            let _scope = TransactionScope::new(memory()).unwrap();
            Arc::clone(Transaction::current().unwrap().handle())
        };
        assert!(Transaction::current().is_none());
        assert!(handle.is_rolled_back());
        assert!(handle.is_disposed());
    }
}
