//! Shared domain types for creditflow.
//!
//! Workflows, applications, scorecards and deployments, plus their error
//! types and the global configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod application;
pub mod config;
pub mod deployment;
pub mod error;
pub mod scorecard;
pub mod workflow;
