//! Global configuration loader for creditflow.
//!
//! Reads `config.toml` from the data directory (`~/.creditflow/` by default)
//! and deserializes it into [`GlobalConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::{Path, PathBuf};

use creditflow_types::config::GlobalConfig;

/// Directory name used under the home directory when no data dir is given.
const DEFAULT_DIR_NAME: &str = ".creditflow";

/// Resolve the data directory: an explicit path wins, otherwise
/// `~/.creditflow`, otherwise `./.creditflow`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME),
    }
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.deployment.path_prefix, "/api/execute");
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
[server]
host = "0.0.0.0"
port = 8088

[engine]
api_timeout_secs = 10

[deployment]
path_prefix = "/decide"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.engine.api_timeout_secs, 10);
        assert_eq!(config.engine.max_visits, 1000);
        assert_eq!(config.deployment.path_prefix, "/decide");
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn resolve_data_dir_prefers_explicit() {
        let dir = resolve_data_dir(Some(Path::new("/srv/creditflow")));
        assert_eq!(dir, PathBuf::from("/srv/creditflow"));

        let default = resolve_data_dir(None);
        assert!(default.ends_with(".creditflow"));
    }
}
