//! Global configuration types for creditflow.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default, so an empty or partial file works.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_db_file")]
    pub file: String,
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
}

fn default_db_file() -> String {
    "creditflow.db".to_string()
}

fn default_max_readers() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
            max_readers: default_max_readers(),
        }
    }
}

/// Execution engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default timeout for outbound `api` node calls.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    /// Hard bound on node visits in one execution attempt.
    #[serde(default = "default_max_visits")]
    pub max_visits: usize,
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_max_visits() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout_secs(),
            max_visits: default_max_visits(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
}

fn default_per_page() -> u32 {
    20
}

fn default_max_per_page() -> u32 {
    100
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

impl PaginationConfig {
    /// Resolve requested page/per_page into `(limit, offset)`.
    ///
    /// Pages are 1-based; `per_page` is clamped to `1..=max_per_page`.
    pub fn resolve(&self, page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
        let per_page = per_page
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page.max(1));
        let page = page.unwrap_or(1).max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Prefix for generated API paths.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

fn default_path_prefix() -> String {
    "/api/execute".to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            path_prefix: default_path_prefix(),
        }
    }
}
