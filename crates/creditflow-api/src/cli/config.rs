//! `creditflow check-config`: print the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use creditflow_infra::sqlite::pool::database_url;
use creditflow_types::config::GlobalConfig;

/// Render the configuration as it would be written in `config.toml`.
pub fn render_toml(config: &GlobalConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

pub fn check_config(data_dir: &Path, config: &GlobalConfig, json: bool) -> Result<()> {
    let config_path = data_dir.join("config.toml");

    if json {
        let report = serde_json::json!({
            "data_dir": data_dir.display().to_string(),
            "config_file": config_path.display().to_string(),
            "config_file_exists": config_path.exists(),
            "database_url": database_url(data_dir, &config.database.file),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} creditflow v{}",
        style("⚙").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("  Data dir:    {}", style(data_dir.display()).cyan());
    if config_path.exists() {
        println!("  Config file: {}", style(config_path.display()).cyan());
    } else {
        println!(
            "  Config file: {} {}",
            style(config_path.display()).dim(),
            style("(not found, using defaults)").yellow()
        );
    }
    println!(
        "  Database:    {}",
        style(data_dir.join(&config.database.file).display()).cyan()
    );
    println!();
    println!("  {}", style("── Effective configuration ──").dim());
    for line in render_toml(config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
