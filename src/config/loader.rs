use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse JSON config file: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Source '{source_name}' (dbtype '{dbtype}') is missing required field '{field}'")]
    MissingField {
        source_name: String,
        dbtype: String,
        field: &'static str,
    },

    #[error("Source '{source_name}' has an invalid name pattern: {error}")]
    InvalidPattern {
        source_name: String,
        error: regex::Error,
    },

    #[error("Source '{0}' is defined more than once")]
    DuplicateSource(String),

    #[error("Source '{0}' not found")]
    SourceNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML (or `.json`) file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let config = if is_json {
        parse_json(&contents)?
    } else {
        parse_toml(&contents)?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Parse configuration from TOML text without validating it
pub fn parse_toml(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

/// Parse configuration from JSON text without validating it
pub fn parse_json(contents: &str) -> Result<Config> {
    Ok(serde_json::from_str(contents)?)
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.encryption.is_empty() {
        return Err(ConfigError::ValidationError(
            "Encryption key must not be empty".to_string(),
        ));
    }

    if config.storage.is_empty() {
        return Err(ConfigError::ValidationError(
            "No storage targets defined".to_string(),
        ));
    }

    if config.global.dump_tool.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "global.dump_tool must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::DuplicateSource(source.name.clone()));
        }
    }

    for target in &config.storage {
        validate_target(target)?;
    }

    if let Some(ref monitor) = config.monitor {
        if monitor.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "monitor.url must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_target(target: &StorageTarget) -> Result<()> {
    match target {
        StorageTarget::Swift(swift) => {
            if swift.container_url.trim().is_empty() || swift.auth_url.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Storage target '{}': auth_url and container_url are required",
                    target.label()
                )));
            }
        }
        StorageTarget::Rclone(rclone) => {
            if rclone.remote.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Storage target '{}': remote must not be empty",
                    target.label()
                )));
            }
        }
    }
    Ok(())
}

/// Select the configured source with the given name
pub fn select_source(config: &Config, name: &str) -> Result<Source> {
    config
        .sources
        .iter()
        .find(|s| s.name == name)
        .cloned()
        .ok_or_else(|| ConfigError::SourceNotFound(name.to_string()))
}
