//! Deployment repository trait definition.

use chrono::{DateTime, Utc};
use creditflow_types::deployment::Deployment;
use creditflow_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for deployments.
///
/// Implementations should enforce path uniqueness among active deployments
/// at the storage level as well (reporting `RepositoryError::Conflict`);
/// the publisher's registry is the primary authority.
pub trait DeploymentRepository: Send + Sync {
    /// Upsert a deployment.
    ///
    /// `execution_count` and `last_executed_at` belong to
    /// [`record_execution`](Self::record_execution): an update never
    /// overwrites them, so a redeploy cannot lose concurrent increments.
    fn save_deployment(
        &self,
        deployment: &Deployment,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_deployment(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Deployment>, RepositoryError>> + Send;

    /// List deployments, newest first.
    fn list_deployments(
        &self,
        active_only: bool,
    ) -> impl std::future::Future<Output = Result<Vec<Deployment>, RepositoryError>> + Send;

    /// Atomically increment `execution_count` and set `last_executed_at`.
    ///
    /// Returns the new count.
    fn record_execution(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
