//! High-level store API.
//!
//! Each store wraps the shared [`ConnectionPool`](crate::sqlite::ConnectionPool)
//! and composes repository calls into session-centric operations. Methods
//! are synchronous and check out one pooled connection per call; write
//! paths that read before writing take the database write lock up front
//! with `BEGIN IMMEDIATE`.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::errors::Result;

mod access;
mod listing;
mod quota;
mod shares;
mod sync;
pub mod types;

pub use access::{AccessResolver, evaluate_access};
pub use listing::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SessionLister};
pub use quota::{QuotaLedger, needs_reset};
pub use shares::ShareStore;
pub use sync::SyncStore;

/// Begin a transaction that holds the write lock from its first statement.
pub(crate) fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}
