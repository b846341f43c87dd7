//! HTTP request handlers for the REST API.

pub mod application;
pub mod deployment;
pub mod scorecard;
pub mod workflow;
