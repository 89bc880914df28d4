//! The per-thread ambient transaction slot.
//!
//! Only `TransactionScope` writes the slot; everything else reads it through
//! `Transaction::current()`.

use std::cell::RefCell;

use super::Transaction;

thread_local! {
    static CURRENT: RefCell<Option<Transaction>> = const { RefCell::new(None) };
}

pub(crate) fn current() -> Option<Transaction> {
    CURRENT.try_with(|slot| slot.borrow().clone()).ok().flatten()
}

/// Installs `transaction` and returns what the slot held before.
pub(crate) fn replace(transaction: Option<Transaction>) -> Option<Transaction> {
    CURRENT.try_with(|slot| slot.replace(transaction)).ok().flatten()
}
