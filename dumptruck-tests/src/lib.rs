//! Test utilities for dumptruck
//!
//! This crate provides shared test utilities, fixtures and helper functions
//! for testing the dumptruck engine.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::with_fake_tools(
//!         ConfigBuilder::minimal().add_source("orders", "postgres"),
//!     );
//!     let manager = BackupManager::new(ctx.load()).unwrap();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use dumptruck::config::{Config, GlobalConfig, Source, SourceKind, StorageTarget};

// Re-export mock implementations from the main crate
pub use dumptruck::managers::notification::mock::RecordingPush;
pub use dumptruck::storage::mock::{BackendCall, MockBackend};
pub use dumptruck::strategies::mock::MockDumpTool;
pub use dumptruck::utils::executor::mock::{MockExecutor, MockResponse};
pub use dumptruck::utils::executor::CommandExecutor;
pub use dumptruck::utils::ravendb::mock::MockRavenDb;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
