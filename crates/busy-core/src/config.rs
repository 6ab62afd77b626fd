//! Engine configuration loader.
//!
//! Reads `config.toml` (`~/.busy/config.toml` when run from the CLI) into an
//! [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed so a broken config never prevents a run.

use std::path::Path;

use busy_types::config::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// Parse and check a TOML document.
///
/// Missing fields take their defaults. An empty `default_layer` or a zero
/// `event_channel_capacity` is rejected.
pub fn parse_engine_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;

    if config.default_layer.trim().is_empty() {
        return Err(ConfigError::Invalid("default_layer must not be empty".to_string()));
    }
    if config.event_channel_capacity == 0 {
        return Err(ConfigError::Invalid(
            "event_channel_capacity must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

/// Load the engine configuration from `path`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or invalid file: a warning is logged and the default returned.
pub async fn load_engine_config(path: &Path) -> EngineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    match parse_engine_config(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{}: {err}, using defaults", path.display());
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(&tmp.path().join("config.toml")).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn test_valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
max_execution_depth = 3
start_in_manual_mode = true
default_layer = "fulfilment"
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(&path).await;
        assert_eq!(config.max_execution_depth, 3);
        assert!(config.start_in_manual_mode);
        assert_eq!(config.default_layer, "fulfilment");
        assert_eq!(config.event_channel_capacity, 1024);
    }

    #[tokio::test]
    async fn test_malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "max_execution_depth = [not valid")
            .await
            .unwrap();

        let config = load_engine_config(&path).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_empty_layer_is_rejected() {
        let err = parse_engine_config(r#"default_layer = "  ""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = parse_engine_config("event_channel_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("event_channel_capacity"));
    }

    #[test]
    fn test_wrong_type_is_a_parse_error() {
        let err = parse_engine_config(r#"max_execution_depth = "deep""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
