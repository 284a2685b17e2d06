use super::loader::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    /// Key material handed to the dump tool, never interpreted here
    pub encryption: String,

    pub sources: Vec<Source>,

    pub storage: Vec<StorageTarget>,

    /// Push-metrics settings (optional)
    #[serde(default)]
    pub monitor: Option<MonitorConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Command used for every dump/restore invocation
    #[serde(default = "default_dump_tool")]
    pub dump_tool: String,

    /// Directory where artifacts are staged before upload and after fetch
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// rclone binary used by remote-sync targets
    #[serde(default = "default_rclone_binary")]
    pub rclone_binary: String,

    /// Timeout settings
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// Logging configuration. Without a directory only the console is used.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dump_tool: default_dump_tool(),
            staging_dir: default_staging_dir(),
            rclone_binary: default_rclone_binary(),
            command_timeout_seconds: default_command_timeout(),
            http_timeout_seconds: default_http_timeout(),
            log_directory: None,
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// Pushgateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// A configured backup source, validated into its dbtype-specific shape at load time
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    /// Number of remote artifacts to retain per storage target
    pub keep: usize,
    pub kind: SourceKind,
}

#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Any engine handled by the dump tool's generic path (postgres, mysql, ...)
    Generic(GenericConnection),
    /// A single RavenDB database
    RavenDb(RavenDbConnection),
    /// Every database on a RavenDB server whose name matches a pattern
    RavenDbCluster(RavenDbCluster),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericConnection {
    pub dbtype: String,
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub tunnel: Option<String>,
}

/// RavenDB server address and client certificate pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RavenDbEndpoint {
    pub url: String,
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RavenDbConnection {
    pub endpoint: RavenDbEndpoint,
    pub database: String,
    /// Restrict the dump to these collections (None = all)
    pub collections: Option<Vec<String>>,
    pub tunnel: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RavenDbCluster {
    pub endpoint: RavenDbEndpoint,
    pub name_pattern: NamePattern,
    pub collections: Option<Vec<String>>,
    pub tunnel: Option<String>,
}

/// Database name filter, anchored at the start of the name only
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

pub const RAVENDB_DBTYPE: &str = "ravendb";

impl Source {
    /// The dbtype tag as configured
    pub fn dbtype(&self) -> &str {
        match &self.kind {
            SourceKind::Generic(conn) => &conn.dbtype,
            SourceKind::RavenDb(_) | SourceKind::RavenDbCluster(_) => RAVENDB_DBTYPE,
        }
    }

    /// Configured database name; umbrella sources have none
    pub fn database(&self) -> Option<&str> {
        match &self.kind {
            SourceKind::Generic(conn) => Some(&conn.database),
            SourceKind::RavenDb(conn) => Some(&conn.database),
            SourceKind::RavenDbCluster(_) => None,
        }
    }

    pub fn is_multi_tenant(&self) -> bool {
        matches!(self.kind, SourceKind::RavenDbCluster(_))
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawSource::deserialize(deserializer)?;
        Source::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Source as written in the configuration file, before per-dbtype validation
#[derive(Debug, Clone, Deserialize)]
struct RawSource {
    name: String,
    dbtype: String,
    #[serde(default = "default_keep")]
    keep: usize,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    tunnel: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    cert: Option<PathBuf>,
    #[serde(default)]
    key: Option<PathBuf>,
    #[serde(default)]
    collections: Option<Vec<String>>,
    #[serde(default, alias = "database_regex")]
    name_pattern: Option<String>,
}

impl RawSource {
    fn require<T>(&self, value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
        value.ok_or_else(|| ConfigError::MissingField {
            source_name: self.name.clone(),
            dbtype: self.dbtype.clone(),
            field,
        })
    }

    fn endpoint(&self) -> Result<RavenDbEndpoint, ConfigError> {
        Ok(RavenDbEndpoint {
            url: self.require(self.url.clone(), "url")?,
            cert: self.require(self.cert.clone(), "cert")?,
            key: self.require(self.key.clone(), "key")?,
        })
    }
}

impl TryFrom<RawSource> for Source {
    type Error = ConfigError;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Source name must not be empty".to_string(),
            ));
        }

        let tunnel = raw.tunnel.clone().filter(|t| !t.is_empty());

        let kind = if raw.dbtype == RAVENDB_DBTYPE {
            let endpoint = raw.endpoint()?;
            match raw.name_pattern {
                Some(ref pattern) => {
                    let name_pattern =
                        NamePattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                            source_name: raw.name.clone(),
                            error: e,
                        })?;
                    SourceKind::RavenDbCluster(RavenDbCluster {
                        endpoint,
                        name_pattern,
                        collections: raw.collections.clone(),
                        tunnel,
                    })
                }
                None => SourceKind::RavenDb(RavenDbConnection {
                    endpoint,
                    database: raw.require(raw.database.clone(), "database")?,
                    collections: raw.collections.clone(),
                    tunnel,
                }),
            }
        } else {
            if raw.name_pattern.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "Source '{}': name_pattern is only supported for dbtype '{}'",
                    raw.name, RAVENDB_DBTYPE
                )));
            }
            SourceKind::Generic(GenericConnection {
                dbtype: raw.dbtype.clone(),
                host: raw.require(raw.host.clone(), "host")?,
                username: raw.require(raw.username.clone(), "username")?,
                password: raw.require(raw.password.clone(), "password")?,
                database: raw.require(raw.database.clone(), "database")?,
                tunnel,
            })
        };

        Ok(Source {
            name: raw.name,
            keep: raw.keep,
            kind,
        })
    }
}

/// One configured storage backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageTarget {
    /// OpenStack Swift container behind Keystone authentication
    Swift(SwiftTarget),
    /// Any rclone remote
    Rclone(RcloneTarget),
}

#[derive(Clone, Deserialize, Serialize)]
pub struct SwiftTarget {
    #[serde(default)]
    pub name: Option<String>,
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_id: String,
    pub user_domain_id: String,
    pub container_url: String,
}

impl fmt::Debug for SwiftTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwiftTarget")
            .field("name", &self.name)
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("user_domain_id", &self.user_domain_id)
            .field("container_url", &self.container_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RcloneTarget {
    #[serde(default)]
    pub name: Option<String>,
    pub remote: String,
    pub target: String,
    /// rclone profile holding the remote's credentials
    #[serde(default)]
    pub config: Option<PathBuf>,
}

impl StorageTarget {
    /// Human readable label used in logs and reports
    pub fn label(&self) -> String {
        match self {
            StorageTarget::Swift(t) => t
                .name
                .clone()
                .unwrap_or_else(|| format!("swift:{}", t.container_url)),
            StorageTarget::Rclone(t) => t
                .name
                .clone()
                .unwrap_or_else(|| format!("rclone:{}:{}", t.remote, t.target)),
        }
    }
}

// Default value functions

fn default_dump_tool() -> String { "dump.sh".to_string() }
fn default_staging_dir() -> PathBuf { PathBuf::from(".") }
fn default_rclone_binary() -> String { "rclone".to_string() }
fn default_command_timeout() -> u64 { 21600 }
fn default_http_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_keep() -> usize { 7 }
