//! Test context and harness for command tests
//!
//! Owns a temporary directory holding the config file, the fake dump tool, the
//! fake rclone and its remote storage root.

use crate::config_builder::ConfigBuilder;
use crate::fixtures::{dump_tool_calls, fake_dump_tool, fake_rclone, remote_objects};
use anyhow::Result;
use dumptruck::config::{load_config, Config};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    config_path: Option<PathBuf>,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            config_path: None,
        }
    }

    /// Persist a config whose dump tool and rclone are the fake scripts
    pub fn with_fake_tools(builder: ConfigBuilder) -> Self {
        let bin_dir = builder.temp_dir().join("bin");
        let remote_root = builder.temp_dir().join("remote");
        let dump_tool = fake_dump_tool(&bin_dir);
        let rclone = fake_rclone(&bin_dir, &remote_root);

        let (config_path, temp_dir) = builder
            .with_dump_tool(&dump_tool)
            .with_rclone_binary(&rclone)
            .persist();

        Self {
            temp_dir,
            config_path: Some(config_path),
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> &Path {
        self.config_path
            .as_deref()
            .expect("Context was created without a config")
    }

    /// Load the persisted configuration
    pub fn load(&self) -> Config {
        load_config(self.config_path()).expect("Failed to load persisted config")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.path().join("stage")
    }

    /// Objects stored by the fake rclone under `target`
    pub fn remote_objects(&self, target: &str) -> Vec<String> {
        remote_objects(&self.temp_dir.path().join("remote"), target)
    }

    /// Place an object on the fake rclone remote
    pub fn put_remote_object(&self, target: &str, object: &str) -> PathBuf {
        self.create_file(&format!("remote/{}/{}", target, object), "encrypted dump")
    }

    /// Lines logged by the fake dump tool
    pub fn dump_tool_calls(&self) -> Vec<String> {
        dump_tool_calls(&self.temp_dir.path().join("bin"))
    }

    /// Files left in the staging directory (the lock file excluded)
    pub fn staged_files(&self) -> Vec<String> {
        std::fs::read_dir(self.staging_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .filter(|name| !name.starts_with('.'))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}
