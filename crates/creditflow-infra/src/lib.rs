//! Infrastructure layer for creditflow.
//!
//! Contains implementations of the ports defined in `creditflow-core`:
//! SQLite repositories, the HTTP caller for `api` nodes, and the
//! configuration loader.

pub mod config;
pub mod sqlite;
pub mod workflow;
