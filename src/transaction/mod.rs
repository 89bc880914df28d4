// ============================================================================
// Ambient Transactions
// ============================================================================
//
// A thread-scoped "current transaction" lets nested call chains share one
// driver transaction without passing it around.
//
// - RootTransaction: owns a freshly begun driver transaction; may commit
// - DependentTransaction: shares the root's handle; may only roll back
// - TransactionScope: installs one of the above on entry and restores the
//   previous ambient transaction on exit
//
// Every transaction in a chain points at the same `TransactionHandle`.
//
// ============================================================================

mod ambient;
pub mod handle;
pub mod scope;
pub mod state;

pub use handle::TransactionHandle;
pub use scope::TransactionScope;
pub use state::{IsolationLevel, TransactionId, TransactionState};

use std::sync::Arc;

use crate::core::{DbError, Result};
use crate::driver::DriverConnection;

/// A transaction that began its own driver transaction.
#[derive(Debug, Clone)]
pub struct RootTransaction {
    handle: Arc<TransactionHandle>,
}

impl RootTransaction {
    /// Opens `connection` if it is closed and begins a driver transaction on it.
    pub fn begin(connection: Box<dyn DriverConnection>, isolation_level: IsolationLevel) -> Result<Self> {
        let handle = TransactionHandle::begin(connection, isolation_level)?;
        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    pub fn handle(&self) -> &Arc<TransactionHandle> {
        &self.handle
    }

    pub fn id(&self) -> TransactionId {
        self.handle.id()
    }

    pub fn commit(&self) -> Result<()> {
        self.handle.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.handle.rollback()
    }

    /// Releases the connection, rolling back first if still active.
    pub fn dispose(&self) -> Result<()> {
        self.handle.dispose()
    }
}

/// A nested participant in a root transaction.
#[derive(Debug, Clone)]
pub struct DependentTransaction {
    handle: Arc<TransactionHandle>,
    depth: usize,
}

impl DependentTransaction {
    pub fn handle(&self) -> &Arc<TransactionHandle> {
        &self.handle
    }

    /// Nesting level below the root (the first dependent is 1).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn rollback(&self) -> Result<()> {
        self.handle.rollback()
    }
}

#[derive(Debug, Clone)]
pub enum Transaction {
    Root(RootTransaction),
    Dependent(DependentTransaction),
}

impl Transaction {
    /// The ambient transaction of the calling thread.
    pub fn current() -> Option<Transaction> {
        ambient::current()
    }

    pub fn handle(&self) -> &Arc<TransactionHandle> {
        match self {
            Transaction::Root(root) => &root.handle,
            Transaction::Dependent(dependent) => &dependent.handle,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.handle().id()
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Transaction::Root(_))
    }

    pub fn depth(&self) -> usize {
        match self {
            Transaction::Root(_) => 0,
            Transaction::Dependent(dependent) => dependent.depth,
        }
    }

    /// True once the shared handle has left the active state.
    pub fn is_completed(&self) -> bool {
        !self.handle().state().is_active()
    }

    /// Idempotent; any level of the chain may roll back.
    pub fn rollback(&self) -> Result<()> {
        self.handle().rollback()
    }

    /// Commits a root transaction. Dependents cannot commit.
    pub fn commit(&self) -> Result<()> {
        match self {
            Transaction::Root(root) => root.commit(),
            Transaction::Dependent(dependent) => Err(DbError::Programming(format!(
                "Cannot commit dependent transaction {} (depth {}); only the root commits",
                dependent.handle.id(),
                dependent.depth
            ))),
        }
    }

    /// A dependent sharing this transaction's handle, one level deeper.
    pub fn dependent_clone(&self) -> DependentTransaction {
        DependentTransaction {
            handle: Arc::clone(self.handle()),
            depth: self.depth() + 1,
        }
    }

    /// Same handle and same nesting level.
    pub fn ptr_eq(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(self.handle(), other.handle()) && self.depth() == other.depth()
    }
}

impl From<RootTransaction> for Transaction {
    fn from(root: RootTransaction) -> Self {
        Transaction::Root(root)
    }
}

impl From<DependentTransaction> for Transaction {
    fn from(dependent: DependentTransaction) -> Self {
        Transaction::Dependent(dependent)
    }
}
