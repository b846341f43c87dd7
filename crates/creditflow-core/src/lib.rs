//! Business logic and repository trait definitions for creditflow.
//!
//! This crate defines the "ports" (repository traits and the outbound
//! `ApiCaller`) that the infrastructure layer implements. It depends only on
//! `creditflow-types` -- never on `creditflow-infra` or any database/IO crate.

pub mod deployment;
pub mod repository;
pub mod scorecard;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
