//! SQLite application repository implementation.
//!
//! Applications and their execution log. Log rows carry no foreign key to
//! `applications` so deleting an application keeps its audit trail.

use chrono::{DateTime, Utc};
use creditflow_core::repository::application::ApplicationRepository;
use creditflow_types::application::{
    Application, ApplicationFilter, ApplicationStatus, ExecutionLogEntry, LogStatus,
};
use creditflow_types::error::RepositoryError;
use creditflow_types::workflow::NodeType;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ApplicationRepository`.
#[derive(Clone)]
pub struct SqliteApplicationRepository {
    pool: DatabasePool,
}

impl SqliteApplicationRepository {
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

fn parse_json(s: Option<String>, what: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
    s.as_deref()
        .map(|s| {
            serde_json::from_str(s)
                .map_err(|e| RepositoryError::Query(format!("invalid {what} JSON: {e}")))
        })
        .transpose()
}

fn to_json(value: Option<&serde_json::Value>) -> Result<Option<String>, RepositoryError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Query(e.to_string()))
}

fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Result<Application, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let workflow_id: String = row.try_get("workflow_id").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let data: String = row.try_get("application_data").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;
    let updated_at: String = row.try_get("updated_at").map_err(get)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(get)?;

    Ok(Application {
        id: parse_uuid(&id)?,
        workflow_id: parse_uuid(&workflow_id)?,
        workflow_version: row.try_get("workflow_version").map_err(get)?,
        applicant_name: row.try_get("applicant_name").map_err(get)?,
        applicant_id: row.try_get("applicant_id").map_err(get)?,
        application_data: serde_json::from_str(&data)
            .map_err(|e| RepositoryError::Query(format!("invalid application_data JSON: {e}")))?,
        status: status.parse().map_err(RepositoryError::Query)?,
        score: row.try_get("score").map_err(get)?,
        result: parse_json(row.try_get("result").map_err(get)?, "result")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
        completed_at: completed_at.as_deref().map(parse_datetime).transpose()?,
    })
}

fn row_to_log_entry(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionLogEntry, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let application_id: String = row.try_get("application_id").map_err(get)?;
    let sequence: i64 = row.try_get("sequence").map_err(get)?;
    let node_type: Option<String> = row.try_get("node_type").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(ExecutionLogEntry {
        id: parse_uuid(&id)?,
        application_id: parse_uuid(&application_id)?,
        sequence: sequence as u32,
        node_id: row.try_get("node_id").map_err(get)?,
        node_type: node_type
            .as_deref()
            .map(|s| s.parse::<NodeType>().map_err(RepositoryError::Query))
            .transpose()?,
        action: row.try_get("action").map_err(get)?,
        input_data: parse_json(row.try_get("input_data").map_err(get)?, "input_data")?,
        output_data: parse_json(row.try_get("output_data").map_err(get)?, "output_data")?,
        status: status.parse::<LogStatus>().map_err(RepositoryError::Query)?,
        error_message: row.try_get("error_message").map_err(get)?,
        execution_time: row.try_get("execution_time").map_err(get)?,
        created_at: parse_datetime(&created_at)?,
    })
}

// ---------------------------------------------------------------------------
// ApplicationRepository impl
// ---------------------------------------------------------------------------

impl ApplicationRepository for SqliteApplicationRepository {
    async fn create_application(&self, application: &Application) -> Result<(), RepositoryError> {
        let data = serde_json::to_string(&application.application_data)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO applications
               (id, workflow_id, workflow_version, applicant_name, applicant_id,
                application_data, status, score, result, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(application.id.to_string())
        .bind(application.workflow_id.to_string())
        .bind(&application.workflow_version)
        .bind(&application.applicant_name)
        .bind(&application.applicant_id)
        .bind(&data)
        .bind(application.status.to_string())
        .bind(application.score)
        .bind(to_json(application.result.as_ref())?)
        .bind(format_datetime(&application.created_at))
        .bind(format_datetime(&application.updated_at))
        .bind(application.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_application(&self, id: &Uuid) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM applications WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_application).transpose()
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let status = filter.status.map(|s| s.to_string());
        let workflow_id = filter.workflow_id.map(|id| id.to_string());

        // LIMIT -1 is "no limit" in SQLite.
        let rows = sqlx::query(
            r#"SELECT * FROM applications
               WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR workflow_id = ?2)
               ORDER BY created_at DESC, id DESC
               LIMIT ?3 OFFSET ?4"#,
        )
        .bind(&status)
        .bind(&workflow_id)
        .bind(filter.limit.map_or(-1, i64::from))
        .bind(i64::from(filter.offset.unwrap_or(0)))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_application).collect()
    }

    async fn count_applications(&self, filter: &ApplicationFilter) -> Result<u64, RepositoryError> {
        let status = filter.status.map(|s| s.to_string());
        let workflow_id = filter.workflow_id.map(|id| id.to_string());

        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM applications
               WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR workflow_id = ?2)"#,
        )
        .bind(&status)
        .bind(&workflow_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }

    async fn transition_status(
        &self,
        id: &Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE applications SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.to_string())
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(from.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish_application(&self, application: &Application) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE applications SET status = ?, score = ?, result = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(application.status.to_string())
        .bind(application.score)
        .bind(to_json(application.result.as_ref())?)
        .bind(application.completed_at.as_ref().map(format_datetime))
        .bind(format_datetime(&application.updated_at))
        .bind(application.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_application(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO execution_logs
               (id, application_id, sequence, node_id, node_type, action, input_data,
                output_data, status, error_message, execution_time, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.application_id.to_string())
        .bind(i64::from(entry.sequence))
        .bind(&entry.node_id)
        .bind(entry.node_type.map(|t| t.to_string()))
        .bind(&entry.action)
        .bind(to_json(entry.input_data.as_ref())?)
        .bind(to_json(entry.output_data.as_ref())?)
        .bind(entry.status.to_string())
        .bind(&entry.error_message)
        .bind(entry.execution_time)
        .bind(format_datetime(&entry.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_logs(
        &self,
        application_id: &Uuid,
    ) -> Result<Vec<ExecutionLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM execution_logs WHERE application_id = ? ORDER BY sequence ASC",
        )
        .bind(application_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_log_entry).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
