//! Workflow engine core: graph model, validation, and execution.
//!
//! - `graph` -- petgraph view of a workflow and structural validation
//! - `expression` -- JEXL evaluator for decision conditions
//! - `api_call` -- outbound call seam for `api` nodes
//! - `engine` -- per-application execution with an append-only log
//! - `definition` -- JSON/YAML definition files

pub mod api_call;
pub mod definition;
pub mod engine;
pub mod expression;
pub mod graph;
