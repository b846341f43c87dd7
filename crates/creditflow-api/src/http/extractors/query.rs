//! Query parameter extractors for list endpoints.

use std::str::FromStr;

use creditflow_core::service::application::ApplicationQuery;
use creditflow_types::application::ApplicationStatus;
use creditflow_types::workflow::WorkflowStatus;
use serde::Deserialize;
use uuid::Uuid;

use crate::http::error::AppError;

fn parse_status<T: FromStr<Err = String>>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(AppError::Validation),
    }
}

/// Query parameters for the application list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct ApplicationListQuery {
    /// Filter by status (pending, processing, completed, rejected, error).
    pub status: Option<String>,
    pub workflow_id: Option<Uuid>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ApplicationListQuery {
    /// Parse the status filter; paging is clamped by the service.
    pub fn into_query(self) -> Result<ApplicationQuery, AppError> {
        Ok(ApplicationQuery {
            status: parse_status::<ApplicationStatus>(self.status.as_deref())?,
            workflow_id: self.workflow_id,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

/// Query parameters for the workflow list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct WorkflowListQuery {
    /// Filter by status (draft, active, archived).
    pub status: Option<String>,
}

impl WorkflowListQuery {
    pub fn status(&self) -> Result<Option<WorkflowStatus>, AppError> {
        parse_status(self.status.as_deref())
    }
}

/// Query parameters for the deployment list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct DeploymentListQuery {
    #[serde(default)]
    pub active_only: bool,
}
