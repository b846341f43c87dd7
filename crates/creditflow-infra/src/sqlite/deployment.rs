//! SQLite deployment repository implementation.
//!
//! A partial unique index keeps `api_path` unique among active rows, backing
//! up the publisher's in-process registry when several processes share one
//! database file.

use chrono::{DateTime, Utc};
use creditflow_core::repository::deployment::DeploymentRepository;
use creditflow_types::deployment::{Deployment, DeploymentStatus};
use creditflow_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DeploymentRepository`.
#[derive(Clone)]
pub struct SqliteDeploymentRepository {
    pool: DatabasePool,
}

impl SqliteDeploymentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json(s: &str, what: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what} JSON: {e}")))
}

fn row_to_deployment(row: &sqlx::sqlite::SqliteRow) -> Result<Deployment, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let workflow_id: String = row.try_get("workflow_id").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let revision: i64 = row.try_get("revision").map_err(get)?;
    let execution_count: i64 = row.try_get("execution_count").map_err(get)?;
    let last_executed_at: Option<String> = row.try_get("last_executed_at").map_err(get)?;
    let input_schema: String = row.try_get("input_schema").map_err(get)?;
    let output_schema: String = row.try_get("output_schema").map_err(get)?;
    let api_doc: String = row.try_get("api_doc").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;
    let updated_at: String = row.try_get("updated_at").map_err(get)?;

    Ok(Deployment {
        id: parse_uuid(&id)?,
        workflow_id: parse_uuid(&workflow_id)?,
        workflow_version: row.try_get("workflow_version").map_err(get)?,
        api_name: row.try_get("api_name").map_err(get)?,
        api_path: row.try_get("api_path").map_err(get)?,
        status: status.parse::<DeploymentStatus>().map_err(RepositoryError::Query)?,
        revision: revision as u32,
        execution_count: execution_count.max(0) as u64,
        last_executed_at: last_executed_at.as_deref().map(parse_datetime).transpose()?,
        input_schema: parse_json(&input_schema, "input_schema")?,
        output_schema: parse_json(&output_schema, "output_schema")?,
        api_doc: parse_json(&api_doc, "api_doc")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ---------------------------------------------------------------------------
// DeploymentRepository impl
// ---------------------------------------------------------------------------

impl DeploymentRepository for SqliteDeploymentRepository {
    async fn save_deployment(&self, deployment: &Deployment) -> Result<(), RepositoryError> {
        let to_json = |v: &serde_json::Value| {
            serde_json::to_string(v).map_err(|e| RepositoryError::Query(e.to_string()))
        };

        // Counters are only ever written by record_execution.
        sqlx::query(
            r#"INSERT INTO deployments
               (id, workflow_id, workflow_version, api_name, api_path, status, revision,
                execution_count, last_executed_at, input_schema, output_schema, api_doc,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 workflow_version = excluded.workflow_version,
                 api_name = excluded.api_name,
                 api_path = excluded.api_path,
                 status = excluded.status,
                 revision = excluded.revision,
                 input_schema = excluded.input_schema,
                 output_schema = excluded.output_schema,
                 api_doc = excluded.api_doc,
                 updated_at = excluded.updated_at"#,
        )
        .bind(deployment.id.to_string())
        .bind(deployment.workflow_id.to_string())
        .bind(&deployment.workflow_version)
        .bind(&deployment.api_name)
        .bind(&deployment.api_path)
        .bind(deployment.status.to_string())
        .bind(i64::from(deployment.revision))
        .bind(deployment.execution_count as i64)
        .bind(deployment.last_executed_at.as_ref().map(format_datetime))
        .bind(to_json(&deployment.input_schema)?)
        .bind(to_json(&deployment.output_schema)?)
        .bind(to_json(&deployment.api_doc)?)
        .bind(format_datetime(&deployment.created_at))
        .bind(format_datetime(&deployment.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => RepositoryError::Conflict(format!(
                "api path '{}' is already active",
                deployment.api_path
            )),
            _ => RepositoryError::Query(e.to_string()),
        })?;

        Ok(())
    }

    async fn get_deployment(&self, id: &Uuid) -> Result<Option<Deployment>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM deployments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_deployment).transpose()
    }

    async fn list_deployments(&self, active_only: bool) -> Result<Vec<Deployment>, RepositoryError> {
        let rows = if active_only {
            sqlx::query("SELECT * FROM deployments WHERE status = 'active' ORDER BY created_at DESC")
                .fetch_all(&self.pool.reader)
                .await
        } else {
            sqlx::query("SELECT * FROM deployments ORDER BY created_at DESC")
                .fetch_all(&self.pool.reader)
                .await
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_deployment).collect()
    }

    async fn record_execution(&self, id: &Uuid, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            r#"UPDATE deployments
               SET execution_count = execution_count + 1, last_executed_at = ?
               WHERE id = ?
               RETURNING execution_count"#,
        )
        .bind(format_datetime(&at))
        .bind(id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        let count: i64 = row
            .try_get("execution_count")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn sample_deployment(api_path: &str) -> Deployment {
        let now = Utc::now();
        Deployment {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            workflow_version: "1.0.0".to_string(),
            api_name: "personal-loan".to_string(),
            api_path: api_path.to_string(),
            status: DeploymentStatus::Active,
            revision: 1,
            execution_count: 0,
            last_executed_at: None,
            input_schema: json!({"type": "object", "properties": {}, "additionalProperties": true}),
            output_schema: json!({"type": "object"}),
            api_doc: json!({"openapi": "3.0.0"}),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_and_get_deployment() {
        let repo = SqliteDeploymentRepository::new(test_pool().await);
        let dep = sample_deployment("/api/execute/personal-loan");
        repo.save_deployment(&dep).await.unwrap();

        let loaded = repo.get_deployment(&dep.id).await.unwrap().unwrap();
        assert_eq!(loaded.api_path, "/api/execute/personal-loan");
        assert_eq!(loaded.status, DeploymentStatus::Active);
        assert_eq!(loaded.api_doc["openapi"], "3.0.0");
        assert_eq!(loaded.input_schema["additionalProperties"], true);
    }

    #[tokio::test]
    async fn test_active_path_unique_at_storage_level() {
        let repo = SqliteDeploymentRepository::new(test_pool().await);
        let mut first = sample_deployment("/api/execute/loan");
        repo.save_deployment(&first).await.unwrap();

        let second = sample_deployment("/api/execute/loan");
        let err = repo.save_deployment(&second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        first.status = DeploymentStatus::Inactive;
        repo.save_deployment(&first).await.unwrap();
        repo.save_deployment(&second).await.unwrap();

        let active = repo.list_deployments(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
        assert_eq!(repo.list_deployments(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_never_overwrites_counters() {
        let repo = SqliteDeploymentRepository::new(test_pool().await);
        let mut dep = sample_deployment("/api/execute/loan");
        repo.save_deployment(&dep).await.unwrap();
        repo.record_execution(&dep.id, Utc::now()).await.unwrap();

        dep.revision = 2;
        dep.workflow_version = "1.1.0".to_string();
        repo.save_deployment(&dep).await.unwrap();

        let loaded = repo.get_deployment(&dep.id).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 2);
        assert_eq!(loaded.execution_count, 1);
        assert!(loaded.last_executed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_execution_concurrent() {
        let repo = Arc::new(SqliteDeploymentRepository::new(test_pool().await));
        let dep = sample_deployment("/api/execute/loan");
        repo.save_deployment(&dep).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = Arc::clone(&repo);
            let id = dep.id;
            handles.push(tokio::spawn(async move {
                repo.record_execution(&id, Utc::now()).await.unwrap()
            }));
        }
        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=20).collect::<Vec<u64>>());

        let loaded = repo.get_deployment(&dep.id).await.unwrap().unwrap();
        assert_eq!(loaded.execution_count, 20);
    }

    #[tokio::test]
    async fn test_record_execution_unknown() {
        let repo = SqliteDeploymentRepository::new(test_pool().await);
        let err = repo
            .record_execution(&Uuid::now_v7(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
