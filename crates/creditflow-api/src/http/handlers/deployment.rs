//! Deployment handlers: publish workflows as endpoints and serve them.
//!
//! Management routes live under `/api/v1/deployment...`. Invocation happens
//! on each deployment's own `api_path`, dispatched by [`serve_deployed`]
//! which the main router installs as its fallback.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use uuid::Uuid;

use creditflow_types::application::ExecutionResult;
use creditflow_types::deployment::{DeployRequest, Deployment};

use crate::http::error::AppError;
use crate::http::extractors::query::DeploymentListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Build the deployment management sub-router.
pub fn deployment_routes() -> Router<AppState> {
    Router::new()
        .route("/deployments", get(list_deployments))
        .route("/deployment/workflow/{id}", post(deploy_workflow))
        .route(
            "/deployment/{id}",
            get(get_deployment).delete(undeploy),
        )
        .route("/deployment/{id}/redeploy", post(redeploy))
        .route("/deployment/{id}/invoke", post(invoke))
        .route("/deployment/{id}/test", post(test_deployment))
        .route("/deployment/{id}/swagger", get(swagger))
}

/// Parse an invocation body. An empty body is an empty input object.
pub fn parse_input(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serde_json::from_slice::<Map<String, Value>>(body)
        .map_err(|e| AppError::Validation(format!("request body must be a JSON object: {e}")))
}

/// Parse a test request body. The tester client wraps its payload as
/// `{"input": {...}}`; a body whose only key is an `input` object is unwrapped,
/// anything else is taken as the input itself.
pub fn parse_test_input(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    let mut input = parse_input(body)?;
    if input.len() == 1 && input.get("input").is_some_and(Value::is_object) {
        if let Some(Value::Object(inner)) = input.remove("input") {
            return Ok(inner);
        }
    }
    Ok(input)
}

fn self_link(id: &Uuid) -> String {
    format!("/api/v1/deployment/{id}")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/deployment/workflow/{id} - Publish the workflow's active version.
pub async fn deploy_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    body: Option<Json<DeployRequest>>,
) -> Result<Json<ApiResponse<Deployment>>, AppError> {
    let timer = RequestTimer::start();
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let deployment = state.publisher.deploy(&workflow_id, request).await?;
    let link = self_link(&deployment.id);
    let api_path = deployment.api_path.clone();
    Ok(Json(
        timer
            .finish(deployment)
            .with_link("self", &link)
            .with_link("invoke", &api_path)
            .with_link("swagger", &format!("{link}/swagger")),
    ))
}

/// DELETE /api/v1/deployment/{id} - Deactivate and free the path.
pub async fn undeploy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Deployment>>, AppError> {
    let timer = RequestTimer::start();
    let deployment = state.publisher.undeploy(&id).await?;
    Ok(Json(timer.finish(deployment).with_link("self", &self_link(&id))))
}

/// POST /api/v1/deployment/{id}/redeploy - Re-pin to the latest active version.
pub async fn redeploy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Deployment>>, AppError> {
    let timer = RequestTimer::start();
    let deployment = state.publisher.redeploy(&id).await?;
    Ok(Json(timer.finish(deployment).with_link("self", &self_link(&id))))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub async fn list_deployments(
    State(state): State<AppState>,
    Query(query): Query<DeploymentListQuery>,
) -> Result<Json<ApiResponse<Vec<Deployment>>>, AppError> {
    let timer = RequestTimer::start();
    let deployments = state.publisher.list_deployments(query.active_only).await?;
    Ok(Json(timer.finish(deployments).with_link("self", "/api/v1/deployments")))
}

pub async fn get_deployment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Deployment>>, AppError> {
    let timer = RequestTimer::start();
    let deployment = state.publisher.get_deployment(&id).await?;
    Ok(Json(
        timer
            .finish(deployment)
            .with_link("swagger", &format!("{}/swagger", self_link(&id))),
    ))
}

/// GET /api/v1/deployment/{id}/swagger - Raw OpenAPI document.
pub async fn swagger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(state.publisher.api_doc(&id).await?))
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// POST /api/v1/deployment/{id}/invoke
pub async fn invoke(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<ExecutionResult>>, AppError> {
    let timer = RequestTimer::start();
    let result = state.publisher.invoke(&id, parse_input(&body)?).await?;
    Ok(Json(timer.finish(result)))
}

/// POST /api/v1/deployment/{id}/test - Invoke with the result marked as a test.
pub async fn test_deployment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<ExecutionResult>>, AppError> {
    let timer = RequestTimer::start();
    let result = state.publisher.test(&id, parse_test_input(&body)?).await?;
    Ok(Json(timer.finish(result)))
}

/// Fallback for every path not matched by a static route.
///
/// `POST {api_path}` runs the deployment bound to that path and answers
/// with the bare execution result; `GET {api_path}` returns its OpenAPI
/// document. Unbound paths answer 404.
pub async fn serve_deployed(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let path = uri.path();
    match method {
        Method::POST => {
            let input = parse_input(&body)?;
            let result = state.publisher.invoke_path(path, input).await?;
            Ok(Json(result).into_response())
        }
        Method::GET => {
            let deployment = state.publisher.by_path(path).await?;
            Ok(Json(deployment.api_doc).into_response())
        }
        other => Err(AppError::MethodNotAllowed(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_accepts_empty_body() {
        assert!(parse_input(b"").unwrap().is_empty());
        assert!(parse_input(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_input_object() {
        let input = parse_input(br#"{"income": 52000, "employed": true}"#).unwrap();
        assert_eq!(input["income"], 52000);
        assert_eq!(input["employed"], true);
    }

    #[test]
    fn test_parse_test_input_unwraps_envelope() {
        let input = parse_test_input(br#"{"input": {"income": 52000, "age": 41}}"#).unwrap();
        assert_eq!(input["income"], 52000);
        assert_eq!(input["age"], 41);

        // A bare payload is used as is.
        let input = parse_test_input(br#"{"income": 52000}"#).unwrap();
        assert_eq!(input["income"], 52000);

        // `input` next to other fields, or not an object, is an ordinary field.
        let input = parse_test_input(br#"{"input": {"a": 1}, "income": 1}"#).unwrap();
        assert_eq!(input.len(), 2);
        let input = parse_test_input(br#"{"input": "raw"}"#).unwrap();
        assert_eq!(input["input"], "raw");

        assert!(parse_test_input(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_input_rejects_non_objects() {
        assert!(matches!(parse_input(b"[1, 2]"), Err(AppError::Validation(_))));
        assert!(matches!(parse_input(b"{not json"), Err(AppError::Validation(_))));
    }
}
