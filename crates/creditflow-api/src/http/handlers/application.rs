//! Application handlers: create, list, execute, and inspect execution logs.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use creditflow_types::application::{
    Application, ApplicationPage, CreateApplicationRequest, ExecutionLogEntry, ExecutionResult,
};

use crate::http::error::AppError;
use crate::http::extractors::query::ApplicationListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Build the application sub-router.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/applications", post(create_application).get(list_applications))
        .route(
            "/applications/{id}",
            get(get_application).delete(delete_application),
        )
        .route("/applications/{id}/execute", post(execute_application))
        .route("/applications/{id}/logs", get(list_logs))
}

/// POST /api/v1/applications - Create a pending application pinned to the
/// workflow's active version.
pub async fn create_application(
    State(state): State<AppState>,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let timer = RequestTimer::start();
    let application = state.application_service.create_application(body).await?;
    let link = format!("/api/v1/applications/{}", application.id);
    Ok(Json(
        timer
            .finish(application)
            .with_link("self", &link)
            .with_link("execute", &format!("{link}/execute")),
    ))
}

/// GET /api/v1/applications?status=&workflow_id=&page=&per_page=
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApiResponse<ApplicationPage>>, AppError> {
    let timer = RequestTimer::start();
    let page = state
        .application_service
        .list_applications(query.into_query()?)
        .await?;
    Ok(Json(timer.finish(page).with_link("self", "/api/v1/applications")))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let timer = RequestTimer::start();
    let application = state.application_service.get_application(&id).await?;
    Ok(Json(
        timer
            .finish(application)
            .with_link("logs", &format!("/api/v1/applications/{id}/logs")),
    ))
}

/// DELETE /api/v1/applications/{id} - Execution logs are kept.
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.application_service.delete_application(&id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true, "id": id }))))
}

/// POST /api/v1/applications/{id}/execute - Run a pending application.
///
/// Node failures still answer 200 with `status: "error"` in the result.
pub async fn execute_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExecutionResult>>, AppError> {
    let timer = RequestTimer::start();
    let result = state.application_service.execute_application(&id).await?;
    Ok(Json(
        timer
            .finish(result)
            .with_link("logs", &format!("/api/v1/applications/{id}/logs")),
    ))
}

/// GET /api/v1/applications/{id}/logs - Ordered execution log.
pub async fn list_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ExecutionLogEntry>>>, AppError> {
    let timer = RequestTimer::start();
    let logs = state.application_service.list_logs(&id).await?;
    Ok(Json(timer.finish(logs)))
}
