//! Deployment publishing.
//!
//! - `publisher` -- deploy/undeploy/redeploy lifecycle and invocation
//! - `registry` -- the authority over active API paths
//! - `schema` -- input/output schemas and the OpenAPI document

pub mod publisher;
pub mod registry;
pub mod schema;
