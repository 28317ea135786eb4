//! # synclog-store
//!
//! Session sync, sharing, and quota engine with a `SQLite` backend.
//!
//! - **Sync reconciler**: [`SyncStore`] resolves a client's
//!   `(user, external_id)` to a stable session, merges per-field metadata,
//!   and tracks per-file high-water marks
//! - **Access resolution**: [`AccessResolver`] decides owner / recipient /
//!   system / public access and loads the viewer-appropriate session detail
//! - **Listing**: [`SessionLister`] pages through owned and shared sessions
//!   with search, repository, branch and owner filters
//! - **Shares**: [`ShareStore`] creates, lists, and revokes shares
//! - **Quota**: [`QuotaLedger`] keeps monthly per-user usage counters
//! - **Bootstrap**: [`connect_with_retry`] opens and migrates the database
//!   with backoff and cancellation
//!
//! All stores share one `r2d2` pool. Coordination between concurrent callers
//! is left to `SQLite` (WAL, busy timeout, `BEGIN IMMEDIATE`, unique
//! constraints); there are no in-process locks.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod errors;
pub mod merge;
pub mod sqlite;
pub mod store;

pub use bootstrap::{StoreConfig, connect_with_retry};
pub use errors::{Result, StoreError};
pub use sqlite::connection::{
    ConnectionConfig, ConnectionPool, MEMORY_PATH, PooledConnection, new_file, new_in_memory,
    open_and_migrate,
};
pub use sqlite::repositories::user::{CreateUserOptions, UserRepo};
pub use sqlite::row_types::{QuotaRow, UserRow, UserStatus};
pub use store::types::{
    AccessGrant, CreateShareParams, FileStateUpdate, SessionAccessType, SessionDetail,
    SessionFilterOptions, SessionListItem, SessionListParams, SessionListResult, SessionShare,
    SyncFileDetail, SyncFileState, SyncSession, SyncSessionParams,
};
pub use store::{
    AccessResolver, QuotaLedger, SessionLister, ShareStore, SyncStore, evaluate_access, needs_reset,
};
