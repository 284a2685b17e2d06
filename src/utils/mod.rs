pub mod artifact;
pub mod command;
pub mod locker;
pub mod ravendb;

// Trait-based abstractions for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use artifact::{Artifact, ArtifactEncoding};
pub use executor::{CommandExecutor, RealExecutor};
pub use ravendb::{DatabaseRecord, RavenDbApi, RavenDbClient};
