/// Transaction Guard
///
/// [`Transaction`] is returned by [`Database::start_transaction`] and borrows
/// the database for its whole lifetime, so nothing else can run on it in
/// between. Statements are issued through the guard, which dereferences to the
/// database. The transaction ends exactly once: on `commit`, on `rollback`, or
/// when the guard is dropped, which rolls back. Dropping includes unwinding out
/// of a panic.
use crate::core::db::TransactionState;
use crate::core::Result;
use crate::database::Database;
use std::ops::{Deref, DerefMut};
use tracing::{error, warn};

#[derive(Debug)]
pub struct Transaction<'db> {
    db: &'db mut Database,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db mut Database) -> Self {
        Transaction { db }
    }

    /// Commits and restores autocommit.
    ///
    /// # Errors
    ///
    /// `FluentError::Commit` if the driver refuses; the transaction has been
    /// rolled back in that case.
    pub fn commit(self) -> Result<()> {
        self.db.end_transaction(true)
    }

    /// Discards every change made through this guard.
    ///
    /// # Errors
    ///
    /// `FluentError::Rollback` if the driver refuses.
    pub fn rollback(self) -> Result<()> {
        self.db.end_transaction(false)
    }
}

impl Deref for Transaction<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        &*self.db
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        &mut *self.db
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.db.transaction_state() == TransactionState::Active {
            warn!(
                connection = self.db.connection_name(),
                "transaction dropped without commit, rolling back"
            );
            if let Err(e) = self.db.end_transaction(false) {
                error!(error = %e, "rollback on drop failed");
            }
        }
    }
}
