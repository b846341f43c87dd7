//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `creditflow-core` using sqlx with split
//! read/write pools. Workflows are stored as JSON blobs, with name, version
//! and status mirrored into columns for filtering. Activated versions are
//! copied into `workflow_versions` and never updated.

use chrono::{DateTime, Utc};
use creditflow_core::repository::workflow::WorkflowRepository;
use creditflow_types::error::RepositoryError;
use creditflow_types::workflow::{Workflow, WorkflowStatus};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowRepository`.
#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_definition(row: &sqlx::sqlite::SqliteRow) -> Result<Workflow, RepositoryError> {
    let definition: String = row
        .try_get("definition")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    serde_json::from_str(&definition)
        .map_err(|e| RepositoryError::Query(format!("invalid workflow definition JSON: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let definition_json = serde_json::to_string(workflow)
            .map_err(|e| RepositoryError::Query(format!("serialize workflow: {e}")))?;

        sqlx::query(
            r#"INSERT INTO workflows (id, name, version, status, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 version = excluded.version,
                 status = excluded.status,
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.version)
        .bind(workflow.status.to_string())
        .bind(&definition_json)
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&workflow.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(parse_definition).transpose()
    }

    async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = match status {
            Some(s) => {
                sqlx::query(
                    "SELECT definition FROM workflows WHERE status = ? ORDER BY created_at DESC",
                )
                .bind(s.to_string())
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query("SELECT definition FROM workflows ORDER BY created_at DESC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(parse_definition).collect()
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_version(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let definition_json = serde_json::to_string(workflow)
            .map_err(|e| RepositoryError::Query(format!("serialize workflow: {e}")))?;

        sqlx::query(
            "INSERT INTO workflow_versions (workflow_id, version, definition, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.version)
        .bind(&definition_json)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("version {} already recorded", workflow.version))
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn get_version(
        &self,
        id: &Uuid,
        version: &str,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT definition FROM workflow_versions WHERE workflow_id = ? AND version = ?",
        )
        .bind(id.to_string())
        .bind(version)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(parse_definition).transpose()
    }

    async fn list_versions(&self, id: &Uuid) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT version FROM workflow_versions WHERE workflow_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            let version: String = row
                .try_get("version")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            versions.push(version);
        }
        Ok(versions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
