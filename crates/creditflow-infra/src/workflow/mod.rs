//! Workflow infrastructure.
//!
//! - `http_caller` -- reqwest-backed `ApiCaller` for `api` nodes

pub mod http_caller;
