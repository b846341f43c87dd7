//! Workflow repository trait definition.
//!
//! Stores the current (editable) definition of each workflow plus an
//! immutable snapshot of every version that was ever activated. Applications
//! and deployments pin `(workflow_id, version)` and read snapshots.

use creditflow_types::error::RepositoryError;
use creditflow_types::workflow::{Workflow, WorkflowStatus};
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Current definitions
    // -----------------------------------------------------------------------

    /// Upsert a workflow (insert or replace by ID).
    fn save_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// List workflows, newest first, optionally filtered by status.
    fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// Delete a workflow's current definition. Version snapshots are kept.
    /// Returns `true` if it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Version snapshots
    // -----------------------------------------------------------------------

    /// Record an immutable snapshot of `workflow` at its current version.
    ///
    /// Fails with `RepositoryError::Conflict` if that version already exists.
    fn save_version(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_version(
        &self,
        id: &Uuid,
        version: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Versions recorded for a workflow, oldest first.
    fn list_versions(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
