//! Application and execution-log types.
//!
//! An application is one loan request evaluated by a pinned workflow
//! version. Every node the engine visits appends one `ExecutionLogEntry`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::NodeType;

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// A loan application evaluated by a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Workflow version pinned at creation time.
    pub workflow_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<String>,
    /// Field name -> value as submitted. Never modified by execution.
    pub application_data: serde_json::Map<String, serde_json::Value>,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Execution result (outcome, scoring breakdown, outbound responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Application lifecycle states.
///
/// `pending -> processing -> {completed, rejected, error}`; terminal states
/// never change once reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Rejected,
    Error,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Rejected | ApplicationStatus::Error
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "processing" => Ok(ApplicationStatus::Processing),
            "completed" => Ok(ApplicationStatus::Completed),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "error" => Ok(ApplicationStatus::Error),
            other => Err(format!("invalid application status: '{other}'")),
        }
    }
}

/// Payload for creating an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    pub workflow_id: Uuid,
    #[serde(default)]
    pub application_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<String>,
}

/// Listing filter with pagination.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub workflow_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One page of applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationPage {
    pub items: Vec<Application>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// The shape returned by both `execute` and deployment invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub result: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Execution Log
// ---------------------------------------------------------------------------

/// One node visit. Append-only: entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub application_id: Uuid,
    /// Position in the application's log, starting at 0.
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// What happened (e.g. "execute", "workflow_execution").
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall-clock seconds spent in the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Status of a single log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
    Processing,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogStatus::Success => "success",
            LogStatus::Error => "error",
            LogStatus::Processing => "processing",
        };
        f.write_str(s)
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogStatus::Success),
            "error" => Ok(LogStatus::Error),
            "processing" => Ok(LogStatus::Processing),
            other => Err(format!("invalid log status: '{other}'")),
        }
    }
}
