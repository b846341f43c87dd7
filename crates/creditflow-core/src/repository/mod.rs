//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (creditflow-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod application;
pub mod deployment;
pub mod scorecard;
pub mod workflow;
