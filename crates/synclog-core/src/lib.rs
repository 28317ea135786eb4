//! # synclog-core
//!
//! Foundation types and utilities shared by the synclog crates.
//!
//! - **Branded IDs**: [`SessionId`] and [`ExternalId`] newtypes
//! - **Search text**: [`text::build_prefix_query`] and [`text::build_fts_match`]
//!   for prefix-match expressions
//! - **Timestamps**: fixed-width RFC 3339 formatting for persisted values
//! - **Retry math**: [`RetryConfig`] and exponential backoff with jitter
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod retry;
pub mod text;
pub mod time;

pub use ids::{ExternalId, SessionId};
pub use retry::RetryConfig;
