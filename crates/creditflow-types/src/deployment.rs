//! Deployment types: a workflow version published at a stable path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published binding of one workflow version to an API path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Pinned workflow version.
    pub workflow_version: String,
    pub api_name: String,
    /// Unique among active deployments.
    pub api_path: String,
    pub status: DeploymentStatus,
    /// Starts at 1, incremented by every redeploy.
    pub revision: u32,
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
    /// JSON Schema for invocation input, derived from the start node's fields.
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    /// OpenAPI description of the published endpoint.
    pub api_doc: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Active => write!(f, "active"),
            DeploymentStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(DeploymentStatus::Active),
            "inactive" => Ok(DeploymentStatus::Inactive),
            other => Err(format!("invalid deployment status: '{other}'")),
        }
    }
}

/// Optional overrides when deploying a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    /// Full path override; must start with `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
}

/// Derive a URL-safe API name from a workflow name.
///
/// ```
/// use creditflow_types::deployment::slugify;
///
/// assert_eq!(slugify("Personal Loan Review"), "personal-loan-review");
/// assert_eq!(slugify("  SME  credit (v2)!"), "sme-credit-v2");
/// ```
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    let mut result = String::with_capacity(slug.len());
    let mut prev_was_hyphen = true;
    for c in slug.chars() {
        if c == '-' {
            if !prev_was_hyphen {
                result.push('-');
            }
            prev_was_hyphen = true;
        } else {
            result.push(c);
            prev_was_hyphen = false;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}
