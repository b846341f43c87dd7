use thiserror::Error;
use uuid::Uuid;

use crate::application::ApplicationStatus;
use crate::workflow::{NodeType, ValidationReport, WorkflowStatus};

/// Errors from repository operations (used by trait definitions in creditflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to scorecards and scoring.
#[derive(Debug, Error)]
pub enum ScorecardError {
    #[error("scorecard {0} not found")]
    NotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("attribute {0} not found")]
    AttributeNotFound(Uuid),

    #[error("invalid scaling: {0}")]
    InvalidScaling(String),

    #[error("invalid scorecard name: {0}")]
    InvalidName(String),

    #[error("invalid characteristic: {0}")]
    InvalidCharacteristic(String),

    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors related to workflow lifecycle operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(Uuid),

    #[error("workflow {id} is {status} and cannot be changed")]
    NotEditable { id: Uuid, status: WorkflowStatus },

    #[error("workflow {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("workflow failed validation: {}", .0.error_summary())]
    Invalid(ValidationReport),

    #[error("invalid workflow version '{0}'")]
    InvalidVersion(String),

    #[error("invalid workflow name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors raised while executing an application through a workflow.
///
/// Node-level variants carry the node id and type so a failure can be
/// located in the execution log.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("workflow {id} version {version} not found")]
    WorkflowNotFound { id: Uuid, version: String },

    #[error("workflow {id} is {status}, expected active")]
    WorkflowNotActive { id: Uuid, status: WorkflowStatus },

    #[error("workflow failed validation: {}", .0.error_summary())]
    InvalidWorkflow(ValidationReport),

    #[error("application is already {status}")]
    AlreadyTerminal { status: ApplicationStatus },

    #[error("cycle detected: node '{node_id}' visited twice in one execution")]
    CyclicWorkflow { node_id: String },

    #[error("execution exceeded {limit} node visits")]
    VisitLimitExceeded { limit: usize },

    #[error("no branch matched at decision node '{node_id}'")]
    NoBranchMatched { node_id: String },

    #[error("{node_type} node '{node_id}' has no outgoing edge to follow")]
    MissingOutgoingEdge { node_id: String, node_type: NodeType },

    #[error("edge from '{source_id}' points to unknown node '{node_id}'")]
    UnknownNode { node_id: String, source_id: String },

    #[error("api node '{node_id}' failed: {cause}")]
    ApiCallFailed { node_id: String, cause: String },

    #[error("score node '{node_id}' references unknown scorecard {scorecard_id}")]
    ScorecardNotFound { node_id: String, scorecard_id: Uuid },

    #[error("score node '{node_id}' failed: {cause}")]
    ScoringFailed { node_id: String, cause: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ExecutionError {
    /// The node where the failure happened, if it is node-level.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionError::CyclicWorkflow { node_id }
            | ExecutionError::NoBranchMatched { node_id }
            | ExecutionError::MissingOutgoingEdge { node_id, .. }
            | ExecutionError::UnknownNode { node_id, .. }
            | ExecutionError::ApiCallFailed { node_id, .. }
            | ExecutionError::ScorecardNotFound { node_id, .. }
            | ExecutionError::ScoringFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Stable machine-readable code, stored in error results and returned
    /// by the API.
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::ApplicationNotFound(_) => "APPLICATION_NOT_FOUND",
            ExecutionError::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            ExecutionError::WorkflowNotActive { .. } => "WORKFLOW_NOT_ACTIVE",
            ExecutionError::InvalidWorkflow(_) => "INVALID_WORKFLOW",
            ExecutionError::AlreadyTerminal { .. } => "ALREADY_TERMINAL",
            ExecutionError::CyclicWorkflow { .. } => "CYCLIC_WORKFLOW",
            ExecutionError::VisitLimitExceeded { .. } => "VISIT_LIMIT_EXCEEDED",
            ExecutionError::NoBranchMatched { .. } => "NO_BRANCH_MATCHED",
            ExecutionError::MissingOutgoingEdge { .. } => "MISSING_OUTGOING_EDGE",
            ExecutionError::UnknownNode { .. } => "UNKNOWN_NODE",
            ExecutionError::ApiCallFailed { .. } => "API_CALL_FAILED",
            ExecutionError::ScorecardNotFound { .. } => "SCORECARD_NOT_FOUND",
            ExecutionError::ScoringFailed { .. } => "SCORING_FAILED",
            ExecutionError::Repository(_) => "STORAGE_ERROR",
        }
    }
}

/// Errors from application management (create, list, delete).
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("application {0} not found")]
    NotFound(Uuid),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("workflow {id} is {status}; applications need an active workflow")]
    WorkflowNotActive { id: Uuid, status: WorkflowStatus },

    #[error("application {0} is processing")]
    Busy(Uuid),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors related to publishing and invoking deployments.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("deployment {0} not found")]
    NotFound(Uuid),

    #[error("no active deployment at path '{0}'")]
    PathNotFound(String),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("workflow {id} is {status}; only active workflows can be deployed")]
    WorkflowNotActive { id: Uuid, status: WorkflowStatus },

    #[error("api path '{api_path}' is already served by deployment {deployment_id}")]
    PathConflict { api_path: String, deployment_id: Uuid },

    #[error("invalid api path '{0}'")]
    InvalidPath(String),

    #[error("deployment {0} is not active")]
    NotActive(Uuid),

    #[error("invalid input: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ValidationIssue;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_workflow_invalid_lists_errors() {
        let report = ValidationReport {
            valid: false,
            errors: vec![
                ValidationIssue::MissingStartNode,
                ValidationIssue::CyclicWorkflow {
                    node_id: "a".into(),
                },
            ],
            warnings: vec![],
        };
        let msg = WorkflowError::Invalid(report).to_string();
        assert!(msg.contains("no start node"));
        assert!(msg.contains("cycle"));
    }

    #[test]
    fn test_execution_error_carries_node_context() {
        let err = ExecutionError::MissingOutgoingEdge {
            node_id: "score-1".into(),
            node_type: NodeType::Score,
        };
        assert_eq!(err.node_id(), Some("score-1"));
        assert_eq!(
            err.to_string(),
            "score node 'score-1' has no outgoing edge to follow"
        );
    }

    #[test]
    fn test_deployment_invalid_input_display() {
        let err = DeploymentError::InvalidInput(vec![
            "missing required field 'income'".into(),
            "field 'age' must be integer".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid input: missing required field 'income'; field 'age' must be integer"
        );
    }
}
