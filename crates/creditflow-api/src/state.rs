//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! SQLite implementations from creditflow-infra.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use creditflow_core::deployment::publisher::DeploymentPublisher;
use creditflow_core::service::application::ApplicationService;
use creditflow_core::service::scorecard::ScorecardService;
use creditflow_core::service::workflow::WorkflowService;
use creditflow_core::workflow::engine::ExecutionEngine;
use creditflow_infra::sqlite::application::SqliteApplicationRepository;
use creditflow_infra::sqlite::deployment::SqliteDeploymentRepository;
use creditflow_infra::sqlite::pool::{DatabasePool, database_url};
use creditflow_infra::sqlite::scorecard::SqliteScorecardRepository;
use creditflow_infra::sqlite::workflow::SqliteWorkflowRepository;
use creditflow_infra::workflow::http_caller::HttpApiCaller;
use creditflow_types::config::GlobalConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteEngine =
    ExecutionEngine<SqliteWorkflowRepository, SqliteApplicationRepository, SqliteScorecardRepository>;

pub type ConcreteWorkflowService = WorkflowService<SqliteWorkflowRepository>;

pub type ConcreteScorecardService = ScorecardService<SqliteScorecardRepository>;

pub type ConcreteApplicationService = ApplicationService<
    SqliteWorkflowRepository,
    SqliteApplicationRepository,
    SqliteScorecardRepository,
>;

pub type ConcretePublisher = DeploymentPublisher<
    SqliteWorkflowRepository,
    SqliteApplicationRepository,
    SqliteScorecardRepository,
    SqliteDeploymentRepository,
>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<ConcreteWorkflowService>,
    pub scorecard_service: Arc<ConcreteScorecardService>,
    pub application_service: Arc<ConcreteApplicationService>,
    pub publisher: Arc<ConcretePublisher>,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services and
    /// re-register the paths of active deployments.
    pub async fn init(data_dir: PathBuf, config: GlobalConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = database_url(&data_dir, &config.database.file);
        let db_pool = DatabasePool::with_readers(&db_url, config.database.max_readers).await?;

        let workflows = SqliteWorkflowRepository::new(db_pool.clone());
        let applications = SqliteApplicationRepository::new(db_pool.clone());
        let scorecards = SqliteScorecardRepository::new(db_pool.clone());
        let deployments = SqliteDeploymentRepository::new(db_pool.clone());

        let api_caller = HttpApiCaller::new(Duration::from_secs(config.engine.api_timeout_secs))?;

        // One engine shared by direct execution and deployment invocation.
        let engine: Arc<ConcreteEngine> = Arc::new(ExecutionEngine::new(
            workflows.clone(),
            applications.clone(),
            scorecards.clone(),
            Arc::new(api_caller),
            config.engine.clone(),
        ));

        let application_service = ApplicationService::new(
            workflows.clone(),
            applications.clone(),
            Arc::clone(&engine),
            config.pagination.clone(),
        );

        let publisher = DeploymentPublisher::new(
            workflows.clone(),
            applications,
            deployments,
            engine,
            config.deployment.clone(),
        );
        let restored = publisher.restore().await?;
        tracing::info!(restored, data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            workflow_service: Arc::new(WorkflowService::new(workflows)),
            scorecard_service: Arc::new(ScorecardService::new(scorecards)),
            application_service: Arc::new(application_service),
            publisher: Arc::new(publisher),
        })
    }
}
