//! Application service: intake, listing, execution and audit log access.

use std::sync::Arc;

use chrono::Utc;
use creditflow_types::application::{
    Application, ApplicationFilter, ApplicationPage, ApplicationStatus, CreateApplicationRequest,
    ExecutionLogEntry, ExecutionResult,
};
use creditflow_types::config::PaginationConfig;
use creditflow_types::error::ApplicationError;
use creditflow_types::workflow::WorkflowStatus;
use uuid::Uuid;

use crate::repository::application::ApplicationRepository;
use crate::repository::scorecard::ScorecardRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::engine::ExecutionEngine;

/// Query for a page of applications.
#[derive(Debug, Clone, Default)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub workflow_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Service orchestrating the application lifecycle.
///
/// Execution is delegated to the shared [`ExecutionEngine`].
pub struct ApplicationService<W, A, S> {
    workflows: W,
    applications: A,
    engine: Arc<ExecutionEngine<W, A, S>>,
    pagination: PaginationConfig,
}

impl<W, A, S> ApplicationService<W, A, S>
where
    W: WorkflowRepository,
    A: ApplicationRepository,
    S: ScorecardRepository,
{
    pub fn new(
        workflows: W,
        applications: A,
        engine: Arc<ExecutionEngine<W, A, S>>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            workflows,
            applications,
            engine,
            pagination,
        }
    }

    /// Create a pending application pinned to the workflow's active version.
    pub async fn create_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, ApplicationError> {
        let workflow = self
            .workflows
            .get_workflow(&request.workflow_id)
            .await?
            .ok_or(ApplicationError::WorkflowNotFound(request.workflow_id))?;
        if workflow.status != WorkflowStatus::Active {
            return Err(ApplicationError::WorkflowNotActive {
                id: workflow.id,
                status: workflow.status,
            });
        }

        let now = Utc::now();
        let application = Application {
            id: Uuid::now_v7(),
            workflow_id: workflow.id,
            workflow_version: workflow.version,
            applicant_name: request.applicant_name,
            applicant_id: request.applicant_id,
            application_data: request.application_data,
            status: ApplicationStatus::Pending,
            score: None,
            result: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.applications.create_application(&application).await?;

        tracing::info!(
            application_id = %application.id,
            workflow_id = %application.workflow_id,
            version = application.workflow_version.as_str(),
            "application created"
        );
        Ok(application)
    }

    pub async fn get_application(&self, id: &Uuid) -> Result<Application, ApplicationError> {
        self.applications
            .get_application(id)
            .await?
            .ok_or(ApplicationError::NotFound(*id))
    }

    /// A page of applications, newest first.
    pub async fn list_applications(
        &self,
        query: ApplicationQuery,
    ) -> Result<ApplicationPage, ApplicationError> {
        let (limit, offset) = self.pagination.resolve(query.page, query.per_page);
        let filter = ApplicationFilter {
            status: query.status,
            workflow_id: query.workflow_id,
            limit: Some(limit),
            offset: Some(offset),
        };
        let items = self.applications.list_applications(&filter).await?;
        let total = self.applications.count_applications(&filter).await?;
        Ok(ApplicationPage {
            items,
            total,
            page: offset / limit + 1,
            per_page: limit,
        })
    }

    /// Delete an application. Its execution log is retained.
    pub async fn delete_application(&self, id: &Uuid) -> Result<(), ApplicationError> {
        let application = self.get_application(id).await?;
        if application.status == ApplicationStatus::Processing {
            return Err(ApplicationError::Busy(*id));
        }
        if !self.applications.delete_application(id).await? {
            return Err(ApplicationError::NotFound(*id));
        }
        tracing::info!(application_id = %id, "application deleted");
        Ok(())
    }

    /// Run a pending application through its pinned workflow version.
    pub async fn execute_application(
        &self,
        id: &Uuid,
    ) -> Result<ExecutionResult, ApplicationError> {
        Ok(self.engine.execute(id).await?)
    }

    /// The application's execution log in visit order.
    pub async fn list_logs(&self, id: &Uuid) -> Result<Vec<ExecutionLogEntry>, ApplicationError> {
        Ok(self.applications.list_logs(id).await?)
    }
}
