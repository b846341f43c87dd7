//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use uuid::Uuid;

use creditflow_types::error::{
    ApplicationError, DeploymentError, ExecutionError, RepositoryError, ScorecardError,
    WorkflowError,
};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Workflow(WorkflowError),
    Application(ApplicationError),
    Scorecard(ScorecardError),
    Deployment(DeploymentError),
    /// Malformed request (bad query parameter, unparsable filter).
    Validation(String),
    /// Deployed paths answer only GET and POST.
    MethodNotAllowed(String),
    /// Generic internal error.
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<ApplicationError> for AppError {
    fn from(e: ApplicationError) -> Self {
        AppError::Application(e)
    }
}

impl From<ScorecardError> for AppError {
    fn from(e: ScorecardError) -> Self {
        AppError::Scorecard(e)
    }
}

impl From<DeploymentError> for AppError {
    fn from(e: DeploymentError) -> Self {
        AppError::Deployment(e)
    }
}

/// Status, code, message and optional structured details for one error.
pub struct ErrorParts {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl ErrorParts {
    fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            code,
            message,
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

fn repository_parts(e: &RepositoryError) -> ErrorParts {
    match e {
        RepositoryError::NotFound => ErrorParts::new(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        RepositoryError::Conflict(msg) => ErrorParts::new(StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        RepositoryError::Connection | RepositoryError::Query(_) => {
            tracing::error!(error = %e, "storage failure");
            ErrorParts::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
        }
    }
}

fn execution_parts(e: &ExecutionError) -> ErrorParts {
    let status = match e {
        ExecutionError::ApplicationNotFound(_) | ExecutionError::WorkflowNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        ExecutionError::WorkflowNotActive { .. } | ExecutionError::AlreadyTerminal { .. } => {
            StatusCode::CONFLICT
        }
        ExecutionError::InvalidWorkflow(report) => {
            return ErrorParts::new(StatusCode::BAD_REQUEST, e.code(), e.to_string())
                .with_details(serde_json::to_value(report).unwrap_or(Value::Null));
        }
        ExecutionError::ApiCallFailed { .. } => StatusCode::BAD_GATEWAY,
        ExecutionError::Repository(repo) => return repository_parts(repo),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut parts = ErrorParts::new(status, e.code(), e.to_string());
    if let Some(node_id) = e.node_id() {
        parts = parts.with_details(serde_json::json!({ "node_id": node_id }));
    }
    parts
}

impl AppError {
    pub fn parts(&self) -> ErrorParts {
        use StatusCode as S;

        match self {
            AppError::Workflow(e) => match e {
                WorkflowError::NotFound(_) => ErrorParts::new(S::NOT_FOUND, "WORKFLOW_NOT_FOUND", e.to_string()),
                WorkflowError::NotEditable { .. } => {
                    ErrorParts::new(S::CONFLICT, "WORKFLOW_NOT_EDITABLE", e.to_string())
                }
                WorkflowError::InvalidTransition { .. } => {
                    ErrorParts::new(S::CONFLICT, "INVALID_TRANSITION", e.to_string())
                }
                WorkflowError::Invalid(report) => {
                    ErrorParts::new(S::BAD_REQUEST, "INVALID_WORKFLOW", e.to_string())
                        .with_details(serde_json::to_value(report).unwrap_or(Value::Null))
                }
                WorkflowError::InvalidVersion(_) | WorkflowError::InvalidName(_) => {
                    ErrorParts::new(S::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                WorkflowError::Repository(repo) => repository_parts(repo),
            },

            AppError::Scorecard(e) => match e {
                ScorecardError::NotFound(_) => ErrorParts::new(S::NOT_FOUND, "SCORECARD_NOT_FOUND", e.to_string()),
                ScorecardError::CharacteristicNotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "CHARACTERISTIC_NOT_FOUND", e.to_string())
                }
                ScorecardError::AttributeNotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "ATTRIBUTE_NOT_FOUND", e.to_string())
                }
                ScorecardError::InvalidScaling(_)
                | ScorecardError::InvalidName(_)
                | ScorecardError::InvalidCharacteristic(_)
                | ScorecardError::InvalidAttribute(_) => {
                    ErrorParts::new(S::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                ScorecardError::Repository(repo) => repository_parts(repo),
            },

            AppError::Application(e) => match e {
                ApplicationError::NotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "APPLICATION_NOT_FOUND", e.to_string())
                }
                ApplicationError::WorkflowNotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "WORKFLOW_NOT_FOUND", e.to_string())
                }
                ApplicationError::WorkflowNotActive { .. } => {
                    ErrorParts::new(S::CONFLICT, "WORKFLOW_NOT_ACTIVE", e.to_string())
                }
                ApplicationError::Busy(_) => ErrorParts::new(S::CONFLICT, "APPLICATION_BUSY", e.to_string()),
                ApplicationError::Execution(exec) => execution_parts(exec),
                ApplicationError::Repository(repo) => repository_parts(repo),
            },

            AppError::Deployment(e) => match e {
                DeploymentError::NotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "DEPLOYMENT_NOT_FOUND", e.to_string())
                }
                DeploymentError::PathNotFound(_) => ErrorParts::new(S::NOT_FOUND, "PATH_NOT_FOUND", e.to_string()),
                DeploymentError::WorkflowNotFound(_) => {
                    ErrorParts::new(S::NOT_FOUND, "WORKFLOW_NOT_FOUND", e.to_string())
                }
                DeploymentError::WorkflowNotActive { .. } => {
                    ErrorParts::new(S::CONFLICT, "WORKFLOW_NOT_ACTIVE", e.to_string())
                }
                DeploymentError::PathConflict { deployment_id, .. } => {
                    ErrorParts::new(S::CONFLICT, "PATH_CONFLICT", e.to_string())
                        .with_details(serde_json::json!({ "deployment_id": deployment_id }))
                }
                DeploymentError::InvalidPath(_) => ErrorParts::new(S::BAD_REQUEST, "INVALID_PATH", e.to_string()),
                DeploymentError::NotActive(_) => {
                    ErrorParts::new(S::CONFLICT, "DEPLOYMENT_NOT_ACTIVE", e.to_string())
                }
                DeploymentError::InvalidInput(problems) => {
                    ErrorParts::new(S::BAD_REQUEST, "INVALID_INPUT", e.to_string())
                        .with_details(serde_json::json!({ "problems": problems }))
                }
                DeploymentError::Execution(exec) => execution_parts(exec),
                DeploymentError::Repository(repo) => repository_parts(repo),
            },

            AppError::Validation(msg) => ErrorParts::new(S::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::MethodNotAllowed(method) => ErrorParts::new(
                S::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                format!("method {method} is not supported on deployed paths"),
            ),
            AppError::Internal(msg) => {
                ErrorParts::new(S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let parts = self.parts();
        let body = ApiResponse::error(
            parts.code,
            &parts.message,
            parts.details,
            Uuid::now_v7().to_string(),
            0,
        );
        (parts.status, Json(body)).into_response()
    }
}
