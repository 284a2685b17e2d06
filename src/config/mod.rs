//! Configuration module for dumptruck
//!
//! This module handles loading and validating the run configuration from TOML
//! (or JSON) files.
//!
//! Sources are validated into a dbtype-specific shape while the file is parsed,
//! so a source missing a connection field never reaches the orchestrator.
//!
//! ## Example Usage
//!
//! ```no_run
//! use dumptruck::config;
//!
//! let config = config::load_config("dumptruck.toml")?;
//!
//! for source in &config.sources {
//!     println!("Source: {} ({}), keep {}", source.name, source.dbtype(), source.keep);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_config, parse_json, parse_toml, select_source, validate_config, ConfigError, Result,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_expand_tilde() {
        let path = PathBuf::from("~/dumps");
        let expanded = expand_tilde(&path);
        assert!(!expanded.starts_with("~"));

        let path = PathBuf::from("/var/lib/dumptruck");
        assert_eq!(expand_tilde(&path), path);
    }

    #[test]
    fn test_name_pattern_anchors_at_start_only() {
        let pattern = NamePattern::new("tenant_").unwrap();
        assert!(pattern.matches("tenant_a"));
        assert!(pattern.matches("tenant_"));
        assert!(!pattern.matches("old_tenant_a"));
        assert_eq!(pattern.as_str(), "tenant_");
    }

    #[test]
    fn test_name_pattern_alternation_is_grouped() {
        let pattern = NamePattern::new("a|b").unwrap();
        assert!(pattern.matches("beta"));
        assert!(!pattern.matches("cab"));
    }

    #[test]
    fn test_storage_target_labels() {
        let target = StorageTarget::Rclone(RcloneTarget {
            name: None,
            remote: "b2".to_string(),
            target: "dumps".to_string(),
            config: None,
        });
        assert_eq!(target.label(), "rclone:b2:dumps");
    }
}
