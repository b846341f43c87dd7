//! HTTP implementation of the `ApiCaller` seam used by `api` nodes.
//!
//! [`HttpApiCaller`] implements the [`ApiCaller`] trait from creditflow-core
//! on top of a shared `reqwest::Client`. The trait is defined in core and the
//! implementation lives in infra, same as the SQLite repositories.

use std::time::Duration;

use creditflow_core::workflow::api_call::{ApiCallError, ApiCaller, ApiRequest};
use serde_json::Value;

/// Longest upstream body kept in a status error.
const MAX_ERROR_BODY: usize = 512;

/// Outbound caller backed by `reqwest`.
pub struct HttpApiCaller {
    http_client: reqwest::Client,
}

impl HttpApiCaller {
    /// Create a caller whose client-level timeout is `default_timeout`.
    /// Per-request timeouts from [`ApiRequest`] take precedence.
    pub fn new(default_timeout: Duration) -> Result<Self, ApiCallError> {
        let http_client = reqwest::Client::builder()
            .timeout(default_timeout)
            .user_agent(concat!("creditflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiCallError::InvalidRequest(format!("HTTP client: {e}")))?;
        Ok(Self { http_client })
    }
}

impl ApiCaller for HttpApiCaller {
    fn call(
        &self,
        request: ApiRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Value, ApiCallError>> + Send + '_>,
    > {
        Box::pin(async move {
            let method: reqwest::Method = request.method.parse().map_err(|_| {
                ApiCallError::InvalidRequest(format!("invalid HTTP method: {}", request.method))
            })?;

            let mut builder = self
                .http_client
                .request(method.clone(), &request.url)
                .timeout(request.timeout);

            // GET carries the mapped fields as query parameters.
            builder = if method == reqwest::Method::GET {
                match &request.body {
                    Value::Object(fields) => {
                        let query: Vec<(String, String)> = fields
                            .iter()
                            .map(|(k, v)| {
                                let value = match v {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                (k.clone(), value)
                            })
                            .collect();
                        builder.query(&query)
                    }
                    _ => builder,
                }
            } else {
                builder.json(&request.body)
            };

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    ApiCallError::Timeout(request.timeout)
                } else if e.is_builder() {
                    ApiCallError::InvalidRequest(e.to_string())
                } else {
                    ApiCallError::Transport(format!("request to '{}' failed: {e}", request.url))
                }
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    ApiCallError::Timeout(request.timeout)
                } else {
                    ApiCallError::Transport(format!("failed to read response body: {e}"))
                }
            })?;

            tracing::info!(
                url = request.url.as_str(),
                method = request.method.as_str(),
                status = status.as_u16(),
                body_len = body.len(),
                "api node call completed"
            );

            if !status.is_success() {
                let mut body = body;
                if body.len() > MAX_ERROR_BODY {
                    let cut = (0..=MAX_ERROR_BODY)
                        .rev()
                        .find(|i| body.is_char_boundary(*i))
                        .unwrap_or(0);
                    body.truncate(cut);
                }
                return Err(ApiCallError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            // Non-JSON success bodies are kept verbatim.
            Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
        })
    }
}
