//! Deployment publisher: binds active workflow versions to API paths and
//! runs invocations through the execution engine.

use std::sync::Arc;

use chrono::Utc;
use creditflow_types::application::{Application, ApplicationStatus, ExecutionResult};
use creditflow_types::config::DeploymentConfig;
use creditflow_types::deployment::{DeployRequest, Deployment, DeploymentStatus, slugify};
use creditflow_types::error::DeploymentError;
use creditflow_types::workflow::{Workflow, WorkflowStatus};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::registry::{PathRegistry, is_reserved, normalize_path};
use super::schema;
use crate::repository::application::ApplicationRepository;
use crate::repository::deployment::DeploymentRepository;
use crate::repository::scorecard::ScorecardRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::engine::ExecutionEngine;

/// Publishes workflows as callable endpoints.
///
/// Path uniqueness among active deployments is owned by the [`PathRegistry`];
/// call [`restore`](Self::restore) once at startup to load it from storage.
pub struct DeploymentPublisher<W, A, S, D> {
    workflows: W,
    applications: A,
    deployments: D,
    engine: Arc<ExecutionEngine<W, A, S>>,
    registry: PathRegistry,
    config: DeploymentConfig,
}

impl<W, A, S, D> DeploymentPublisher<W, A, S, D>
where
    W: WorkflowRepository,
    A: ApplicationRepository,
    S: ScorecardRepository,
    D: DeploymentRepository,
{
    pub fn new(
        workflows: W,
        applications: A,
        deployments: D,
        engine: Arc<ExecutionEngine<W, A, S>>,
        config: DeploymentConfig,
    ) -> Self {
        Self {
            workflows,
            applications,
            deployments,
            engine,
            registry: PathRegistry::new(),
            config,
        }
    }

    /// Register the paths of all active deployments found in storage.
    ///
    /// Returns how many were registered.
    pub async fn restore(&self) -> Result<usize, DeploymentError> {
        let active = self.deployments.list_deployments(true).await?;
        let lease = self.registry.lease().await;
        let mut restored = 0;
        for deployment in &active {
            match lease.claim(&deployment.api_path, deployment.id) {
                Ok(()) => restored += 1,
                Err(holder) => tracing::warn!(
                    deployment_id = %deployment.id,
                    holder = %holder,
                    api_path = deployment.api_path.as_str(),
                    "duplicate active path in storage, skipping"
                ),
            }
        }
        tracing::info!(count = restored, "deployments restored");
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Publish the workflow's current active version.
    pub async fn deploy(
        &self,
        workflow_id: &Uuid,
        request: DeployRequest,
    ) -> Result<Deployment, DeploymentError> {
        let snapshot = self.active_snapshot(workflow_id).await?;

        let api_name = match request.api_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => slugify(name),
            _ => slugify(&snapshot.name),
        };
        let api_name = if api_name.is_empty() {
            snapshot.id.simple().to_string()
        } else {
            api_name
        };
        let api_path = match request.api_path {
            Some(path) if path.starts_with('/') => normalize_path(&path),
            Some(path) => return Err(DeploymentError::InvalidPath(path)),
            None => normalize_path(&format!("{}/{}", self.config.path_prefix, api_name)),
        };
        if is_reserved(&api_path) {
            return Err(DeploymentError::InvalidPath(api_path));
        }

        let now = Utc::now();
        let mut deployment = Deployment {
            id: Uuid::now_v7(),
            workflow_id: snapshot.id,
            workflow_version: String::new(),
            api_name,
            api_path,
            status: DeploymentStatus::Active,
            revision: 1,
            execution_count: 0,
            last_executed_at: None,
            input_schema: Value::Null,
            output_schema: Value::Null,
            api_doc: Value::Null,
            created_at: now,
            updated_at: now,
        };
        bind(&mut deployment, &snapshot);

        let lease = self.registry.lease().await;
        lease
            .claim(&deployment.api_path, deployment.id)
            .map_err(|holder| DeploymentError::PathConflict {
                api_path: deployment.api_path.clone(),
                deployment_id: holder,
            })?;
        if let Err(e) = self.deployments.save_deployment(&deployment).await {
            lease.release(&deployment.api_path, deployment.id);
            return Err(e.into());
        }
        drop(lease);

        tracing::info!(
            deployment_id = %deployment.id,
            workflow_id = %deployment.workflow_id,
            version = deployment.workflow_version.as_str(),
            api_path = deployment.api_path.as_str(),
            "workflow deployed"
        );
        Ok(deployment)
    }

    /// Deactivate a deployment and free its path. History is kept.
    pub async fn undeploy(&self, id: &Uuid) -> Result<Deployment, DeploymentError> {
        let mut deployment = self.get_deployment(id).await?;
        if deployment.status == DeploymentStatus::Inactive {
            return Ok(deployment);
        }

        let lease = self.registry.lease().await;
        deployment.status = DeploymentStatus::Inactive;
        deployment.updated_at = Utc::now();
        self.deployments.save_deployment(&deployment).await?;
        lease.release(&deployment.api_path, deployment.id);
        drop(lease);

        tracing::info!(
            deployment_id = %deployment.id,
            api_path = deployment.api_path.as_str(),
            "deployment deactivated"
        );
        Ok(deployment)
    }

    /// Re-bind the deployment's path to the workflow's current active
    /// version, bumping the revision.
    ///
    /// The path and execution counters carry over. An inactive deployment
    /// is reactivated if its path is still free.
    pub async fn redeploy(&self, id: &Uuid) -> Result<Deployment, DeploymentError> {
        let mut deployment = self.get_deployment(id).await?;
        let snapshot = self.active_snapshot(&deployment.workflow_id).await?;

        let previous_version = deployment.workflow_version.clone();
        let was_active = deployment.status == DeploymentStatus::Active;
        bind(&mut deployment, &snapshot);
        deployment.revision += 1;
        deployment.status = DeploymentStatus::Active;
        deployment.updated_at = Utc::now();

        let lease = self.registry.lease().await;
        lease
            .claim(&deployment.api_path, deployment.id)
            .map_err(|holder| DeploymentError::PathConflict {
                api_path: deployment.api_path.clone(),
                deployment_id: holder,
            })?;
        if let Err(e) = self.deployments.save_deployment(&deployment).await {
            // An active deployment already held its path; only a fresh claim is undone.
            if !was_active {
                lease.release(&deployment.api_path, deployment.id);
            }
            return Err(e.into());
        }
        drop(lease);

        tracing::info!(
            deployment_id = %deployment.id,
            revision = deployment.revision,
            from_version = previous_version.as_str(),
            to_version = deployment.workflow_version.as_str(),
            "workflow redeployed"
        );
        // Counters are owned by storage; report what it holds.
        self.get_deployment(id).await
    }

    // -----------------------------------------------------------------------
    // Invocation
    // -----------------------------------------------------------------------

    /// Validate `input`, run it through the pinned workflow version as a new
    /// application, and count the invocation.
    pub async fn invoke(
        &self,
        id: &Uuid,
        input: Map<String, Value>,
    ) -> Result<ExecutionResult, DeploymentError> {
        let deployment = self.get_deployment(id).await?;
        self.run(&deployment, input, false).await
    }

    /// Same as [`invoke`](Self::invoke); the stored result is marked as a test.
    pub async fn test(
        &self,
        id: &Uuid,
        input: Map<String, Value>,
    ) -> Result<ExecutionResult, DeploymentError> {
        let deployment = self.get_deployment(id).await?;
        self.run(&deployment, input, true).await
    }

    /// Invoke the active deployment serving `path`.
    pub async fn invoke_path(
        &self,
        path: &str,
        input: Map<String, Value>,
    ) -> Result<ExecutionResult, DeploymentError> {
        let deployment = self.by_path(path).await?;
        self.run(&deployment, input, false).await
    }

    async fn run(
        &self,
        deployment: &Deployment,
        input: Map<String, Value>,
        test: bool,
    ) -> Result<ExecutionResult, DeploymentError> {
        if deployment.status != DeploymentStatus::Active {
            return Err(DeploymentError::NotActive(deployment.id));
        }
        let problems = schema::validate_input(&deployment.input_schema, &input);
        if !problems.is_empty() {
            return Err(DeploymentError::InvalidInput(problems));
        }

        let now = Utc::now();
        let application = Application {
            id: Uuid::now_v7(),
            workflow_id: deployment.workflow_id,
            workflow_version: deployment.workflow_version.clone(),
            applicant_name: None,
            applicant_id: None,
            application_data: input,
            status: ApplicationStatus::Pending,
            score: None,
            result: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.applications.create_application(&application).await?;

        let mut tags = Map::new();
        tags.insert("deployment_id".to_string(), json!(deployment.id));
        tags.insert("revision".to_string(), json!(deployment.revision));
        if test {
            tags.insert("test".to_string(), Value::Bool(true));
        }
        let result = self.engine.execute_tagged(&application.id, tags).await?;

        let count = self
            .deployments
            .record_execution(&deployment.id, Utc::now())
            .await?;
        tracing::info!(
            deployment_id = %deployment.id,
            application_id = %result.application_id,
            status = %result.status,
            execution_count = count,
            test,
            "deployment invoked"
        );
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_deployment(&self, id: &Uuid) -> Result<Deployment, DeploymentError> {
        self.deployments
            .get_deployment(id)
            .await?
            .ok_or(DeploymentError::NotFound(*id))
    }

    pub async fn list_deployments(
        &self,
        active_only: bool,
    ) -> Result<Vec<Deployment>, DeploymentError> {
        Ok(self.deployments.list_deployments(active_only).await?)
    }

    /// The active deployment serving `path`.
    pub async fn by_path(&self, path: &str) -> Result<Deployment, DeploymentError> {
        let id = self
            .registry
            .resolve(path)
            .ok_or_else(|| DeploymentError::PathNotFound(normalize_path(path)))?;
        self.get_deployment(&id).await
    }

    pub async fn api_doc(&self, id: &Uuid) -> Result<Value, DeploymentError> {
        Ok(self.get_deployment(id).await?.api_doc)
    }

    /// Snapshot of the workflow's current version; the workflow must be active.
    async fn active_snapshot(&self, workflow_id: &Uuid) -> Result<Workflow, DeploymentError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or(DeploymentError::WorkflowNotFound(*workflow_id))?;
        if workflow.status != WorkflowStatus::Active {
            return Err(DeploymentError::WorkflowNotActive {
                id: workflow.id,
                status: workflow.status,
            });
        }
        Ok(self
            .workflows
            .get_version(&workflow.id, &workflow.version)
            .await?
            .unwrap_or(workflow))
    }
}

/// Pin `snapshot` and regenerate everything derived from it.
fn bind(deployment: &mut Deployment, snapshot: &Workflow) {
    deployment.workflow_version = snapshot.version.clone();
    deployment.input_schema = schema::input_schema(snapshot);
    deployment.output_schema = schema::output_schema(snapshot);
    deployment.api_doc = schema::api_document(
        snapshot,
        &deployment.api_name,
        &deployment.api_path,
        &deployment.input_schema,
        &deployment.output_schema,
    );
}
