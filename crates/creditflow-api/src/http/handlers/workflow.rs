//! Workflow CRUD and lifecycle handlers for the REST API.
//!
//! Endpoints for managing workflow definitions, validating graphs, and
//! moving workflows through draft -> active -> archived.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use creditflow_types::workflow::{
    CreateWorkflowRequest, UpdateWorkflowRequest, ValidationReport, Workflow,
};

use crate::http::error::AppError;
use crate::http::extractors::query::WorkflowListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /workflows/{id}/versions`.
#[derive(Debug, Default, Deserialize)]
pub struct NewVersionBody {
    /// Explicit semver; a patch bump is used when omitted.
    #[serde(default)]
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the workflow sub-router.
///
/// Mounted at `/api/v1` by the main router.
pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/workflows/{id}/validate", post(validate_workflow))
        .route("/workflows/{id}/activate", post(activate_workflow))
        .route("/workflows/{id}/archive", post(archive_workflow))
        .route("/workflows/{id}/versions", get(list_versions).post(new_version))
        .route("/workflows/{id}/versions/{version}", get(get_version))
}

fn self_link(id: &Uuid) -> String {
    format!("/api/v1/workflows/{id}")
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows - Create a draft workflow.
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.create_workflow(body).await?;
    let link = self_link(&workflow.id);
    Ok(Json(timer.finish(workflow).with_link("self", &link)))
}

/// GET /api/v1/workflows - List workflows, optionally filtered by status.
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<WorkflowListQuery>,
) -> Result<Json<ApiResponse<Vec<Workflow>>>, AppError> {
    let timer = RequestTimer::start();
    let workflows = state.workflow_service.list_workflows(query.status()?).await?;
    Ok(Json(timer.finish(workflows).with_link("self", "/api/v1/workflows")))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.get_workflow(&id).await?;
    Ok(Json(
        timer
            .finish(workflow)
            .with_link("self", &self_link(&id))
            .with_link("versions", &format!("{}/versions", self_link(&id))),
    ))
}

/// PUT /api/v1/workflows/{id} - Update a draft workflow.
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkflowRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.update_workflow(&id, body).await?;
    Ok(Json(timer.finish(workflow).with_link("self", &self_link(&id))))
}

/// DELETE /api/v1/workflows/{id} - Delete a draft or archived workflow.
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.workflow_service.delete_workflow(&id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true, "id": id }))))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/validate - Structural validation report.
pub async fn validate_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ValidationReport>>, AppError> {
    let timer = RequestTimer::start();
    let report = state.workflow_service.validate_workflow(&id).await?;
    Ok(Json(timer.finish(report)))
}

/// POST /api/v1/workflows/{id}/activate - Validate, snapshot and activate.
pub async fn activate_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.activate_workflow(&id).await?;
    Ok(Json(timer.finish(workflow).with_link("self", &self_link(&id))))
}

/// POST /api/v1/workflows/{id}/archive
pub async fn archive_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.archive_workflow(&id).await?;
    Ok(Json(timer.finish(workflow).with_link("self", &self_link(&id))))
}

/// POST /api/v1/workflows/{id}/versions - Reopen as a draft with a newer version.
pub async fn new_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<NewVersionBody>>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let version = body.and_then(|Json(b)| b.version);
    let workflow = state.workflow_service.new_version(&id, version).await?;
    Ok(Json(timer.finish(workflow).with_link("self", &self_link(&id))))
}

/// GET /api/v1/workflows/{id}/versions - Versions with a recorded snapshot.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let timer = RequestTimer::start();
    let versions = state.workflow_service.list_versions(&id).await?;
    Ok(Json(timer.finish(versions)))
}

/// GET /api/v1/workflows/{id}/versions/{version} - One immutable snapshot.
pub async fn get_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let workflow = state.workflow_service.get_version(&id, &version).await?;
    Ok(Json(timer.finish(workflow)))
}
