//! Application and execution-log repository trait definition.

use creditflow_types::application::{
    Application, ApplicationFilter, ApplicationStatus, ExecutionLogEntry,
};
use creditflow_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for applications and their append-only execution log.
pub trait ApplicationRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Applications
    // -----------------------------------------------------------------------

    fn create_application(
        &self,
        application: &Application,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_application(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Application>, RepositoryError>> + Send;

    /// List applications, newest first.
    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Application>, RepositoryError>> + Send;

    /// Count applications matching the filter (limit/offset ignored).
    fn count_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Atomically move an application from `from` to `to`.
    ///
    /// Returns `false` (and changes nothing) if the stored status is not `from`.
    fn transition_status(
        &self,
        id: &Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Persist the final state of an execution: status, score, result,
    /// completed_at and updated_at.
    fn finish_application(
        &self,
        application: &Application,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete an application record. Its log entries are retained.
    fn delete_application(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Execution log (append-only)
    // -----------------------------------------------------------------------

    fn append_log(
        &self,
        entry: &ExecutionLogEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All log entries of an application, in sequence order.
    fn list_logs(
        &self,
        application_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionLogEntry>, RepositoryError>> + Send;
}
