//! Dump and restore invocation
//!
//! The dump tool is an opaque external command: `<dump-tool> <operation> <args...>`.
//! Each dbtype family has a [`DumpStrategy`] producing its argument shape, and
//! [`DumpTool`] runs the resulting command.

pub mod generic;
pub mod ravendb;

use crate::config::{Source, SourceKind};
use crate::utils::artifact::{Artifact, ArtifactEncoding};
use crate::utils::executor::CommandExecutor;
use crate::utils::ravendb::RavenDbApi;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use generic::GenericStrategy;
pub use ravendb::RavenDbStrategy;

/// Argument shape for one dbtype family
pub trait DumpStrategy {
    /// Encoding of the artifact the dump operation writes
    fn encoding(&self) -> ArtifactEncoding;

    /// Arguments for a dump writing to `output`
    fn dump_args(&self, encryption: &str, output: &Path) -> Result<Vec<String>>;

    /// Arguments for a restore of `input` into `database`
    fn restore_args(&self, encryption: &str, input: &Path, database: &str) -> Vec<String>;

    /// Get strategy name (for logging)
    fn name(&self) -> &'static str;
}

/// Dump/restore capability used by the orchestrators
pub trait DumpInvoker: Send + Sync {
    /// Dump a concrete source into a new staged artifact
    fn dump(&self, encryption: &str, source: &Source) -> Result<Artifact>;

    /// Restore `artifact` into the source's database, or into `database` when given
    fn restore(
        &self,
        artifact: &Path,
        encryption: &str,
        source: &Source,
        database: Option<&str>,
    ) -> Result<()>;
}

/// Runs the configured dump tool
pub struct DumpTool {
    program: String,
    staging_dir: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    ravendb: Arc<dyn RavenDbApi>,
    timeout: Duration,
}

impl DumpTool {
    pub fn new(
        program: &str,
        staging_dir: &Path,
        executor: Arc<dyn CommandExecutor>,
        ravendb: Arc<dyn RavenDbApi>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.to_string(),
            staging_dir: staging_dir.to_path_buf(),
            executor,
            ravendb,
            timeout,
        }
    }

    fn strategy_for<'a>(&'a self, source: &'a Source) -> Result<Box<dyn DumpStrategy + 'a>> {
        match &source.kind {
            SourceKind::Generic(conn) => Ok(Box::new(GenericStrategy::new(conn))),
            SourceKind::RavenDb(conn) => Ok(Box::new(RavenDbStrategy::new(conn, self.ravendb.as_ref()))),
            SourceKind::RavenDbCluster(_) => anyhow::bail!(
                "Source '{}' is a multi-tenant source and must be expanded before use",
                source.name
            ),
        }
    }

    fn invoke(&self, args: &[String]) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.executor
            .run(&self.program, &args, self.timeout)
            .map(|_| ())
    }
}

impl DumpInvoker for DumpTool {
    fn dump(&self, encryption: &str, source: &Source) -> Result<Artifact> {
        let strategy = self.strategy_for(source)?;
        let artifact = Artifact::now(&source.name, strategy.encoding(), &self.staging_dir);

        info!(
            "Dumping '{}' ({}) to {:?}",
            source.name,
            strategy.name(),
            artifact.path
        );

        let args = strategy.dump_args(encryption, &artifact.path)?;
        self.invoke(&args)
            .with_context(|| format!("Dump of '{}' failed", source.name))?;

        Ok(artifact)
    }

    fn restore(
        &self,
        artifact: &Path,
        encryption: &str,
        source: &Source,
        database: Option<&str>,
    ) -> Result<()> {
        let strategy = self.strategy_for(source)?;
        let database = database
            .or_else(|| source.database())
            .with_context(|| format!("No target database for '{}'", source.name))?;

        info!(
            "Restoring {:?} into '{}' ({})",
            artifact,
            database,
            strategy.name()
        );

        let args = strategy.restore_args(encryption, artifact, database);
        self.invoke(&args)
            .with_context(|| format!("Restore of '{}' into '{}' failed", source.name, database))
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Recorded restore invocation
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct RestoreCall {
        pub source: String,
        pub artifact: PathBuf,
        pub database: String,
    }

    /// Writes a small artifact file per dump; selected sources fail
    #[derive(Clone)]
    pub struct MockDumpTool {
        staging_dir: PathBuf,
        failing: Arc<Mutex<HashSet<String>>>,
        fail_restore: Arc<Mutex<bool>>,
        /// Names of sources dumped, in order
        pub dumps: Arc<Mutex<Vec<String>>>,
        pub restores: Arc<Mutex<Vec<RestoreCall>>>,
    }

    impl MockDumpTool {
        pub fn new(staging_dir: &Path) -> Self {
            Self {
                staging_dir: staging_dir.to_path_buf(),
                failing: Arc::new(Mutex::new(HashSet::new())),
                fail_restore: Arc::new(Mutex::new(false)),
                dumps: Arc::new(Mutex::new(Vec::new())),
                restores: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Make the dump of this source exit nonzero
        pub fn failing_for(self, source: &str) -> Self {
            self.failing.lock().unwrap().insert(source.to_string());
            self
        }

        pub fn failing_restore(self) -> Self {
            *self.fail_restore.lock().unwrap() = true;
            self
        }

        pub fn dumped(&self) -> Vec<String> {
            self.dumps.lock().unwrap().clone()
        }

        pub fn restore_calls(&self) -> Vec<RestoreCall> {
            self.restores.lock().unwrap().clone()
        }
    }

    impl DumpInvoker for MockDumpTool {
        fn dump(&self, _encryption: &str, source: &Source) -> Result<Artifact> {
            self.dumps.lock().unwrap().push(source.name.clone());

            let encoding = match source.kind {
                SourceKind::Generic(_) => ArtifactEncoding::Gzip,
                _ => ArtifactEncoding::RavenDbDump,
            };
            let artifact = Artifact::now(&source.name, encoding, &self.staging_dir);

            // A failing dump may still leave a partial file behind
            std::fs::write(&artifact.path, b"dump")?;

            if self.failing.lock().unwrap().contains(&source.name) {
                anyhow::bail!("dump tool exited with status 1 for '{}'", source.name);
            }
            Ok(artifact)
        }

        fn restore(
            &self,
            artifact: &Path,
            _encryption: &str,
            source: &Source,
            database: Option<&str>,
        ) -> Result<()> {
            let database = database
                .or_else(|| source.database())
                .unwrap_or_default()
                .to_string();
            self.restores.lock().unwrap().push(RestoreCall {
                source: source.name.clone(),
                artifact: artifact.to_path_buf(),
                database,
            });

            if *self.fail_restore.lock().unwrap() {
                anyhow::bail!("restore tool exited with status 1");
            }
            Ok(())
        }
    }
}
