//! HTTP/REST API layer for creditflow.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format and
//! CORS support. Deployed workflows are served outside `/api/v1` at their
//! own API paths.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
