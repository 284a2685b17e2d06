//! Dumptruck Library
//!
//! Backs up databases through an external dump tool to Swift containers and
//! rclone remotes, rotates old artifacts and restores them on demand.

pub mod config;
pub mod managers;
pub mod storage;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, ConfigError, Source, SourceKind, StorageTarget};
pub use managers::backup::{BackupManager, BackupReport};
pub use managers::error::BackupError;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
pub use managers::restore::{RestoreManager, RestoreRequest};
