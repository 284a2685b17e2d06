//! Backup orchestration
//!
//! Each concrete source runs through dump, upload to every storage target and
//! rotation on every storage target. Whatever the outcome, the source is
//! reported to the notifier and the staging area is emptied before the next
//! source starts. One source's failure never stops the batch.

use crate::config::{expand_tilde, select_source, Config, ConfigError, Source};
use crate::managers::error::{chain, BackupError};
use crate::managers::notification::NotificationManager;
use crate::managers::resolver::resolve_sources;
use crate::managers::restore::RestoreManager;
use crate::storage::{build_backends, rotate, AuthToken, StorageBackend};
use crate::strategies::{DumpInvoker, DumpTool};
use crate::utils::artifact::{remove_staged_files, Artifact};
use crate::utils::executor::{CommandExecutor, RealExecutor};
use crate::utils::ravendb::{RavenDbApi, RavenDbClient};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Failed concrete source
#[derive(Debug)]
pub struct SourceFailure {
    pub source: String,
    pub error: BackupError,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct BackupReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
}

impl BackupReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} sources backed up, {} failed",
            self.succeeded.len(),
            self.total(),
            self.failed.len()
        )
    }
}

pub struct BackupManager {
    config: Config,
    backends: Vec<Box<dyn StorageBackend>>,
    dumper: Arc<dyn DumpInvoker>,
    ravendb: Arc<dyn RavenDbApi>,
    notifier: NotificationManager,
}

impl BackupManager {
    /// Wire up the real dump tool, storage targets, RavenDB client and notifier
    pub fn new(config: Config) -> Result<Self> {
        let global = &config.global;
        let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
        let http_timeout = Duration::from_secs(global.http_timeout_seconds);

        let ravendb: Arc<dyn RavenDbApi> = Arc::new(RavenDbClient::new(http_timeout));
        let dumper = Arc::new(DumpTool::new(
            &global.dump_tool,
            &expand_tilde(&global.staging_dir),
            executor.clone(),
            ravendb.clone(),
            Duration::from_secs(global.command_timeout_seconds),
        ));
        let backends = build_backends(&config.storage, global, executor)?;
        let notifier = NotificationManager::new(config.monitor.as_ref(), http_timeout)?;

        Ok(Self::with_parts(config, backends, dumper, ravendb, notifier))
    }

    /// Assemble from explicit collaborators
    pub fn with_parts(
        config: Config,
        backends: Vec<Box<dyn StorageBackend>>,
        dumper: Arc<dyn DumpInvoker>,
        ravendb: Arc<dyn RavenDbApi>,
        notifier: NotificationManager,
    ) -> Self {
        Self {
            config,
            backends,
            dumper,
            ravendb,
            notifier,
        }
    }

    pub fn backends(&self) -> &[Box<dyn StorageBackend>] {
        &self.backends
    }

    /// Restore side sharing this manager's storage targets and dump tool
    pub fn restorer(&self) -> RestoreManager<'_> {
        RestoreManager::new(&self.config, &self.backends, self.dumper.clone())
    }

    pub fn staging_dir(&self) -> PathBuf {
        expand_tilde(&self.config.global.staging_dir)
    }

    /// Back up every configured source
    pub fn backup_all(&self) -> BackupReport {
        self.backup_sources(&self.config.sources)
    }

    /// Back up one configured source by name (an umbrella name selects all its tenants)
    pub fn backup_named(&self, name: &str) -> Result<BackupReport, ConfigError> {
        let source = select_source(&self.config, name)?;
        Ok(self.backup_sources(std::slice::from_ref(&source)))
    }

    /// Resolve and back up `sources` in order
    pub fn backup_sources(&self, sources: &[Source]) -> BackupReport {
        let start = Instant::now();
        let mut report = BackupReport::default();
        let mut seen = HashSet::new();

        for resolved in resolve_sources(sources, self.ravendb.as_ref()) {
            let source = match resolved {
                Ok(source) => source,
                Err(failure) => {
                    let error = BackupError::Resolution {
                        source_name: failure.source.name.clone(),
                        reason: chain(&failure.error),
                    };
                    error!("{}", error);
                    self.notifier.send_failure(&failure.source);
                    report.failed.push(SourceFailure {
                        source: failure.source.name,
                        error,
                    });
                    continue;
                }
            };

            if !seen.insert(source.name.clone()) {
                let error = BackupError::Resolution {
                    source_name: source.name.clone(),
                    reason: "another source in this run already uses this name".to_string(),
                };
                warn!("Skipping '{}': {}", source.name, error);
                report.failed.push(SourceFailure {
                    source: source.name,
                    error,
                });
                continue;
            }

            match self.backup_source(&source) {
                Ok(()) => report.succeeded.push(source.name),
                Err(error) => report.failed.push(SourceFailure {
                    source: source.name,
                    error,
                }),
            }
        }

        info!(
            "Backup run finished in {:.1}s: {}",
            start.elapsed().as_secs_f64(),
            report.summary()
        );
        report
    }

    /// Back up one concrete source, then notify and clean up regardless of outcome
    pub fn backup_source(&self, source: &Source) -> Result<(), BackupError> {
        info!("Backing up '{}' ({})", source.name, source.dbtype());

        let outcome = self.run_stages(source);

        match outcome {
            Ok(()) => {
                info!("Backup of '{}' completed", source.name);
                self.notifier.send_success(source, completion_time());
            }
            Err(ref e) => {
                error!("Backup of '{}' failed at {}: {}", source.name, e.stage(), e);
                self.notifier.send_failure(source);
            }
        }

        self.cleanup();
        outcome
    }

    fn run_stages(&self, source: &Source) -> Result<(), BackupError> {
        let artifact = self
            .dumper
            .dump(&self.config.encryption, source)
            .map_err(|e| BackupError::Dump {
                source_name: source.name.clone(),
                reason: chain(&e),
            })?;

        let tokens = self.upload_all(source, &artifact)?;
        self.rotate_all(source, &artifact, &tokens)
    }

    fn upload_all(
        &self,
        source: &Source,
        artifact: &Artifact,
    ) -> Result<Vec<Option<AuthToken>>, BackupError> {
        let mut tokens = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            let upload_error = |e: anyhow::Error| BackupError::Upload {
                source_name: source.name.clone(),
                backend: backend.label().to_string(),
                reason: chain(&e),
            };

            let token = backend.authenticate().map_err(upload_error)?;
            backend
                .upload(token.as_ref(), &artifact.path)
                .map_err(upload_error)?;
            info!("Uploaded '{}' to '{}'", artifact.file_name(), backend.label());
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn rotate_all(
        &self,
        source: &Source,
        artifact: &Artifact,
        tokens: &[Option<AuthToken>],
    ) -> Result<(), BackupError> {
        let prefix = artifact.rotation_prefix();

        for (backend, token) in self.backends.iter().zip(tokens) {
            let deleted = rotate(backend.as_ref(), token.as_ref(), &prefix, source.keep)
                .map_err(|e| BackupError::Rotation {
                    source_name: source.name.clone(),
                    backend: backend.label().to_string(),
                    reason: chain(&e),
                })?;
            debug!(
                "Rotation on '{}' removed {} object(s) for '{}'",
                backend.label(),
                deleted.len(),
                source.name
            );
        }

        Ok(())
    }

    /// Remove every staged artifact; failures are logged only
    pub fn cleanup(&self) {
        let staging_dir = self.staging_dir();
        match remove_staged_files(&staging_dir) {
            Ok(0) => {}
            Ok(count) => debug!("Removed {} staged file(s) from {:?}", count, staging_dir),
            Err(e) => warn!("Failed to clean staging directory {:?}: {:#}", staging_dir, e),
        }
    }
}

/// Unix time with millisecond precision
fn completion_time() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
