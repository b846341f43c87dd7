//! Outbound call seam for `api` nodes.
//!
//! The trait lives here, the HTTP implementation lives in creditflow-infra
//! (same dependency inversion as the repository traits). The engine applies
//! its own timeout around every call, so implementations that ignore
//! `ApiRequest::timeout` are still bounded.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method, upper-case (e.g. "POST").
    pub method: String,
    pub url: String,
    /// Request payload built from the node's field mapping. Sent as a JSON
    /// body, or as query parameters for GET.
    pub body: Value,
    pub timeout: Duration,
}

/// Why an outbound call failed. All variants are treated as failures of the
/// node and handled by its `on_failure` policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiCallError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Performs outbound calls for `api` nodes.
///
/// Returns a boxed future so the engine can hold it as `Arc<dyn ApiCaller>`.
pub trait ApiCaller: Send + Sync {
    fn call(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ApiCallError>> + Send + '_>>;
}
