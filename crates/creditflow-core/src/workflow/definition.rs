//! Workflow definition files.
//!
//! A definition file holds the same payload the API accepts for workflow
//! creation (`name`, `description`, `version`, `nodes`, `edges`), written as
//! JSON or YAML. Used by `creditflow validate`.

use std::path::Path;

use creditflow_types::workflow::CreateWorkflowRequest;
use thiserror::Error;

/// Errors that can occur while loading a definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    /// Pick a format from a file extension. Anything that is not `.json`
    /// is read as YAML (a superset of JSON).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DefinitionFormat::Json,
            _ => DefinitionFormat::Yaml,
        }
    }
}

/// Parse a definition from a string.
pub fn parse_definition(
    content: &str,
    format: DefinitionFormat,
) -> Result<CreateWorkflowRequest, DefinitionError> {
    match format {
        DefinitionFormat::Json => {
            serde_json::from_str(content).map_err(|e| DefinitionError::Parse(e.to_string()))
        }
        DefinitionFormat::Yaml => {
            serde_yaml_ng::from_str(content).map_err(|e| DefinitionError::Parse(e.to_string()))
        }
    }
}

/// Load a definition file, choosing the format from its extension.
pub fn load_definition(path: &Path) -> Result<CreateWorkflowRequest, DefinitionError> {
    let content = std::fs::read_to_string(path)?;
    parse_definition(&content, DefinitionFormat::from_path(path))
}
