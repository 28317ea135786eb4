//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! parameter, so the store layer decides transaction boundaries and every
//! repository call is testable against a bare in-memory connection.

pub mod facet;
pub mod quota;
pub mod session;
pub mod session_list;
pub mod share;
pub mod sync_file;
pub mod user;
