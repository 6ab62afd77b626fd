//! `busy config`: show the effective engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;

use busy_types::config::EngineConfig;

/// Resolve the config file location.
///
/// Priority:
/// 1. `--config` / `BUSY_CONFIG`
/// 2. `~/.busy/config.toml`
/// 3. `.busy/config.toml` in the current directory when there is no home directory
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match dirs::home_dir() {
        Some(home) => home.join(".busy").join("config.toml"),
        None => PathBuf::from(".busy").join("config.toml"),
    }
}

pub fn show_config(config: &EngineConfig, path: &Path, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let source = if path.exists() {
        style(path.display().to_string()).cyan()
    } else {
        style(format!("{} (not found, using defaults)", path.display())).dim()
    };

    println!();
    println!("  {} Engine configuration", style("*").cyan().bold());
    println!("  Source: {source}");
    println!();
    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    for line in rendered.lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}
