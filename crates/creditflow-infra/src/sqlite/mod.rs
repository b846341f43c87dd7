//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod application;
pub mod deployment;
pub mod pool;
pub mod scorecard;
pub mod workflow;
