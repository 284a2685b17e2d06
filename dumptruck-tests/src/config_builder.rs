//! Fluent API for building test configurations
//!
//! Renders a TOML configuration file with sensible defaults: staging, logs and
//! the fake rclone remote all live inside one temporary directory.

use dumptruck::config::{parse_toml, validate_config, Config};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use toml::{Table, Value};

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: Table,
    encryption: String,
    sources: Vec<Table>,
    storage: Vec<Table>,
    monitor: Option<Table>,
}

fn string(value: impl Into<String>) -> Value {
    Value::String(value.into())
}

fn path(value: &Path) -> Value {
    Value::String(value.display().to_string())
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with minimal defaults and no targets
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let staging_dir = temp_dir.path().join("stage");
        fs::create_dir_all(&staging_dir).expect("Failed to create staging dir");

        let mut global = Table::new();
        global.insert("staging_dir".into(), path(&staging_dir));
        global.insert("command_timeout_seconds".into(), Value::Integer(60));
        global.insert("http_timeout_seconds".into(), Value::Integer(10));
        global.insert("log_level".into(), string("debug"));

        Self {
            temp_dir,
            global,
            encryption: "test-encryption-key".to_string(),
            sources: Vec::new(),
            storage: Vec::new(),
            monitor: None,
        }
    }

    /// Create a minimal config with one rclone target
    pub fn minimal() -> Self {
        Self::new().add_rclone_target("local", "backups")
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.path().join("stage")
    }

    /// Set the dump tool command
    pub fn with_dump_tool(mut self, tool: &Path) -> Self {
        self.global.insert("dump_tool".into(), path(tool));
        self
    }

    /// Set the rclone binary
    pub fn with_rclone_binary(mut self, binary: &Path) -> Self {
        self.global.insert("rclone_binary".into(), path(binary));
        self
    }

    /// Write logs to a directory inside the temp dir
    pub fn with_log_dir(mut self) -> Self {
        let dir = self.temp_dir.path().join("logs");
        self.global.insert("log_directory".into(), path(&dir));
        self
    }

    pub fn with_encryption(mut self, encryption: &str) -> Self {
        self.encryption = encryption.to_string();
        self
    }

    /// Add a generic source; the database is `<name>_db`
    pub fn add_source(self, name: &str, dbtype: &str) -> Self {
        self.add_source_with_keep(name, dbtype, 7)
    }

    pub fn add_source_with_keep(mut self, name: &str, dbtype: &str, keep: i64) -> Self {
        let mut source = Table::new();
        source.insert("name".into(), string(name));
        source.insert("dbtype".into(), string(dbtype));
        source.insert("keep".into(), Value::Integer(keep));
        source.insert("host".into(), string("db.internal"));
        source.insert("username".into(), string("backup"));
        source.insert("password".into(), string("hunter2"));
        source.insert("database".into(), string(format!("{}_db", name)));
        self.sources.push(source);
        self
    }

    /// Add a single-database RavenDB source
    pub fn add_ravendb_source(mut self, name: &str, url: &str, collections: &[&str]) -> Self {
        let mut source = self.ravendb_table(name, url);
        source.insert("database".into(), string(name));
        if !collections.is_empty() {
            source.insert(
                "collections".into(),
                Value::Array(collections.iter().map(|c| string(*c)).collect()),
            );
        }
        self.sources.push(source);
        self
    }

    /// Add a multi-tenant RavenDB source
    pub fn add_ravendb_cluster(mut self, name: &str, url: &str, pattern: &str) -> Self {
        let mut source = self.ravendb_table(name, url);
        source.insert("database_regex".into(), string(pattern));
        self.sources.push(source);
        self
    }

    fn ravendb_table(&self, name: &str, url: &str) -> Table {
        let mut source = Table::new();
        source.insert("name".into(), string(name));
        source.insert("dbtype".into(), string("ravendb"));
        source.insert("url".into(), string(url));
        source.insert("cert".into(), path(&self.temp_dir.path().join("client.crt")));
        source.insert("key".into(), path(&self.temp_dir.path().join("client.key")));
        source
    }

    /// Add an rclone target `<remote>:<target>`
    pub fn add_rclone_target(mut self, remote: &str, target: &str) -> Self {
        let mut storage = Table::new();
        storage.insert("type".into(), string("rclone"));
        storage.insert("remote".into(), string(remote));
        storage.insert("target".into(), string(target));
        self.storage.push(storage);
        self
    }

    /// Add a Swift target whose identity and container live on `base_url`
    pub fn add_swift_target(mut self, name: &str, base_url: &str) -> Self {
        let mut storage = Table::new();
        storage.insert("type".into(), string("swift"));
        storage.insert("name".into(), string(name));
        storage.insert("auth_url".into(), string(format!("{}/v3", base_url)));
        storage.insert("username".into(), string("swift-user"));
        storage.insert("password".into(), string("swift-pass"));
        storage.insert("project_id".into(), string("project-1"));
        storage.insert("user_domain_id".into(), string("default"));
        storage.insert(
            "container_url".into(),
            string(format!("{}/v1/AUTH_project-1/dumps", base_url)),
        );
        self.storage.push(storage);
        self
    }

    /// Enable push-gateway notifications
    pub fn with_monitor(mut self, url: &str) -> Self {
        let mut monitor = Table::new();
        monitor.insert("url".into(), string(url));
        monitor.insert("username".into(), string("monitor"));
        monitor.insert("password".into(), string("secret"));
        self.monitor = Some(monitor);
        self
    }

    /// Render the configuration file
    pub fn to_toml(&self) -> String {
        let mut root = Table::new();
        root.insert("encryption".into(), string(self.encryption.clone()));
        root.insert("global".into(), Value::Table(self.global.clone()));
        root.insert(
            "sources".into(),
            Value::Array(self.sources.iter().cloned().map(Value::Table).collect()),
        );
        root.insert(
            "storage".into(),
            Value::Array(self.storage.iter().cloned().map(Value::Table).collect()),
        );
        if let Some(ref monitor) = self.monitor {
            root.insert("monitor".into(), Value::Table(monitor.clone()));
        }
        toml::to_string_pretty(&root).expect("Failed to render config")
    }

    /// Build and validate the config
    pub fn build(self) -> Config {
        let config = parse_toml(&self.to_toml()).expect("Failed to parse built config");
        validate_config(&config).expect("Built config is invalid");
        config
    }

    /// Write `config.toml` and return its path with the temp dir that owns it
    pub fn persist(self) -> (PathBuf, TempDir) {
        let config_path = self.temp_dir.path().join("config.toml");
        fs::write(&config_path, self.to_toml()).expect("Failed to write config");
        (config_path, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
