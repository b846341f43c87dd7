//! Workflow lifecycle service.
//!
//! Draft workflows are freely editable. Activation validates the graph and
//! records an immutable snapshot of the version; applications and
//! deployments pin `(workflow_id, version)` and only ever read snapshots.
//! Changing an active workflow means starting a new draft version.

use chrono::Utc;
use creditflow_types::error::{RepositoryError, WorkflowError};
use creditflow_types::workflow::{
    CreateWorkflowRequest, UpdateWorkflowRequest, ValidationReport, Workflow, WorkflowStatus,
};
use semver::Version;
use uuid::Uuid;

use crate::repository::workflow::WorkflowRepository;
use crate::workflow::graph;

/// Version assigned when a create request omits one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Service orchestrating the workflow lifecycle.
pub struct WorkflowService<W: WorkflowRepository> {
    repo: W,
}

impl<W: WorkflowRepository> WorkflowService<W> {
    pub fn new(repo: W) -> Self {
        Self { repo }
    }

    /// Create a draft workflow.
    pub async fn create_workflow(
        &self,
        request: CreateWorkflowRequest,
    ) -> Result<Workflow, WorkflowError> {
        let name = validate_name(&request.name)?;
        let version = request
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION);
        let version = parse_version(version)?.to_string();

        let now = Utc::now();
        let workflow = Workflow {
            id: Uuid::now_v7(),
            name,
            description: request.description,
            version,
            status: WorkflowStatus::Draft,
            nodes: request.nodes,
            edges: request.edges,
            created_at: now,
            updated_at: now,
        };
        self.repo.save_workflow(&workflow).await?;

        tracing::info!(workflow_id = %workflow.id, name = workflow.name.as_str(), "workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: &Uuid) -> Result<Workflow, WorkflowError> {
        self.repo
            .get_workflow(id)
            .await?
            .ok_or(WorkflowError::NotFound(*id))
    }

    pub async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<Workflow>, WorkflowError> {
        Ok(self.repo.list_workflows(status).await?)
    }

    /// Apply a partial update. Only drafts can be edited.
    pub async fn update_workflow(
        &self,
        id: &Uuid,
        request: UpdateWorkflowRequest,
    ) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get_workflow(id).await?;
        if workflow.status != WorkflowStatus::Draft {
            return Err(WorkflowError::NotEditable {
                id: *id,
                status: workflow.status,
            });
        }

        if let Some(name) = request.name {
            workflow.name = validate_name(&name)?;
        }
        if let Some(description) = request.description {
            workflow.description = description;
        }
        if let Some(version) = request.version {
            workflow.version = parse_version(version.trim())?.to_string();
        }
        if let Some(nodes) = request.nodes {
            workflow.nodes = nodes;
        }
        if let Some(edges) = request.edges {
            workflow.edges = edges;
        }
        workflow.updated_at = Utc::now();

        self.repo.save_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Delete a draft or archived workflow. Active workflows must be archived
    /// first; recorded version snapshots are kept.
    pub async fn delete_workflow(&self, id: &Uuid) -> Result<(), WorkflowError> {
        let workflow = self.get_workflow(id).await?;
        if workflow.status == WorkflowStatus::Active {
            return Err(WorkflowError::NotEditable {
                id: *id,
                status: workflow.status,
            });
        }
        if !self.repo.delete_workflow(id).await? {
            return Err(WorkflowError::NotFound(*id));
        }
        tracing::info!(workflow_id = %id, "workflow deleted");
        Ok(())
    }

    /// Validate the current definition without changing anything.
    pub async fn validate_workflow(&self, id: &Uuid) -> Result<ValidationReport, WorkflowError> {
        let workflow = self.get_workflow(id).await?;
        Ok(graph::validate(&workflow))
    }

    /// Draft -> active. Fails with the validation report if the graph has
    /// errors; on success the version snapshot becomes immutable.
    pub async fn activate_workflow(&self, id: &Uuid) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get_workflow(id).await?;
        if workflow.status != WorkflowStatus::Draft {
            return Err(WorkflowError::InvalidTransition {
                id: *id,
                from: workflow.status,
                to: WorkflowStatus::Active,
            });
        }

        let report = graph::validate(&workflow);
        if !report.valid {
            tracing::info!(
                workflow_id = %id,
                errors = report.errors.len(),
                "workflow activation rejected"
            );
            return Err(WorkflowError::Invalid(report));
        }

        workflow.status = WorkflowStatus::Active;
        workflow.updated_at = Utc::now();

        self.repo.save_version(&workflow).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => WorkflowError::InvalidVersion(format!(
                "{} was already activated; start a new version",
                workflow.version
            )),
            other => WorkflowError::Repository(other),
        })?;
        self.repo.save_workflow(&workflow).await?;

        tracing::info!(
            workflow_id = %id,
            version = workflow.version.as_str(),
            "workflow activated"
        );
        Ok(workflow)
    }

    /// Active or archived -> draft at a strictly greater version (patch bump
    /// when `version` is omitted). Snapshots of earlier versions stay
    /// available to anything pinned to them.
    pub async fn new_version(
        &self,
        id: &Uuid,
        version: Option<String>,
    ) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get_workflow(id).await?;
        if workflow.status == WorkflowStatus::Draft {
            return Err(WorkflowError::InvalidTransition {
                id: *id,
                from: WorkflowStatus::Draft,
                to: WorkflowStatus::Draft,
            });
        }

        let current = parse_version(&workflow.version)?;
        let next = match version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                let next = parse_version(v)?;
                if next <= current {
                    return Err(WorkflowError::InvalidVersion(format!(
                        "{next} must be greater than {current}"
                    )));
                }
                next
            }
            None => Version::new(current.major, current.minor, current.patch + 1),
        };

        let next = next.to_string();
        if self.repo.list_versions(id).await?.contains(&next) {
            return Err(WorkflowError::InvalidVersion(format!(
                "{next} was already activated"
            )));
        }

        workflow.version = next;
        workflow.status = WorkflowStatus::Draft;
        workflow.updated_at = Utc::now();
        self.repo.save_workflow(&workflow).await?;

        tracing::info!(
            workflow_id = %id,
            version = workflow.version.as_str(),
            "new workflow version drafted"
        );
        Ok(workflow)
    }

    /// Active -> archived. Deployments and pinned applications keep working
    /// from their snapshots.
    pub async fn archive_workflow(&self, id: &Uuid) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get_workflow(id).await?;
        if workflow.status != WorkflowStatus::Active {
            return Err(WorkflowError::InvalidTransition {
                id: *id,
                from: workflow.status,
                to: WorkflowStatus::Archived,
            });
        }
        workflow.status = WorkflowStatus::Archived;
        workflow.updated_at = Utc::now();
        self.repo.save_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Activated versions, oldest first.
    pub async fn list_versions(&self, id: &Uuid) -> Result<Vec<String>, WorkflowError> {
        self.get_workflow(id).await?;
        Ok(self.repo.list_versions(id).await?)
    }

    /// The immutable snapshot of one activated version.
    pub async fn get_version(&self, id: &Uuid, version: &str) -> Result<Workflow, WorkflowError> {
        self.repo
            .get_version(id, version)
            .await?
            .ok_or(WorkflowError::NotFound(*id))
    }
}

fn validate_name(name: &str) -> Result<String, WorkflowError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WorkflowError::InvalidName("name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

fn parse_version(version: &str) -> Result<Version, WorkflowError> {
    Version::parse(version).map_err(|e| WorkflowError::InvalidVersion(format!("{version}: {e}")))
}
