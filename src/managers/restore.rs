//! Restore orchestration
//!
//! Fetches one remote object from the first storage target that can produce
//! it, hands it to the dump tool's restore operation and empties the staging
//! area afterwards.

use crate::config::{expand_tilde, Config, Source, SourceKind};
use crate::managers::error::{chain, BackupError, FetchAttempt};
use crate::managers::resolver::tenant_source;
use crate::storage::StorageBackend;
use crate::strategies::DumpInvoker;
use crate::utils::artifact::remove_staged_files;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to restore and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Configured source name
    pub source: String,
    /// Remote object name, e.g. `orders.20240101-0300.gz.enc`
    pub object: String,
    /// Restore into this database instead of the source's own
    pub database: Option<String>,
}

pub struct RestoreManager<'a> {
    config: &'a Config,
    backends: &'a [Box<dyn StorageBackend>],
    dumper: Arc<dyn DumpInvoker>,
}

impl<'a> RestoreManager<'a> {
    pub fn new(
        config: &'a Config,
        backends: &'a [Box<dyn StorageBackend>],
        dumper: Arc<dyn DumpInvoker>,
    ) -> Self {
        Self {
            config,
            backends,
            dumper,
        }
    }

    fn staging_dir(&self) -> PathBuf {
        expand_tilde(&self.config.global.staging_dir)
    }

    /// Run a restore; the staging area is cleaned whatever the outcome
    pub fn restore(&self, request: &RestoreRequest) -> Result<(), BackupError> {
        let source = self
            .config
            .sources
            .iter()
            .find(|s| s.name == request.source)
            .ok_or_else(|| BackupError::RestoreSourceNotFound(request.source.clone()))?;

        if Path::new(&request.object).file_name() != Some(OsStr::new(&request.object)) {
            return Err(BackupError::Restore {
                source_name: source.name.clone(),
                reason: format!("'{}' is not a plain object name", request.object),
            });
        }

        if source.is_multi_tenant() && request.database.is_none() {
            return Err(BackupError::Restore {
                source_name: source.name.clone(),
                reason: "multi-tenant source needs an explicit target database".to_string(),
            });
        }

        let staging_dir = self.staging_dir();
        let outcome = self.fetch_and_restore(source, request, &staging_dir);

        if let Err(e) = remove_staged_files(&staging_dir) {
            warn!("Failed to clean staging directory {:?}: {:#}", staging_dir, e);
        }

        outcome
    }

    fn fetch_and_restore(
        &self,
        source: &Source,
        request: &RestoreRequest,
        staging_dir: &Path,
    ) -> Result<(), BackupError> {
        fs::create_dir_all(staging_dir)
            .with_context(|| format!("Failed to create staging directory: {:?}", staging_dir))
            .map_err(|e| BackupError::Restore {
                source_name: source.name.clone(),
                reason: chain(&e),
            })?;

        let artifact = self.fetch(&request.object, staging_dir)?;

        // An umbrella restores through the tenant it is aimed at
        let concrete;
        let source = match (&source.kind, request.database.as_deref()) {
            (SourceKind::RavenDbCluster(cluster), Some(database)) => {
                concrete = tenant_source(source, cluster, database);
                &concrete
            }
            _ => source,
        };

        let target = request
            .database
            .as_deref()
            .or_else(|| source.database())
            .unwrap_or(&source.name);
        info!("Restoring '{}' into '{}'", request.object, target);

        self.dumper
            .restore(
                &artifact,
                &self.config.encryption,
                source,
                request.database.as_deref(),
            )
            .map_err(|e| BackupError::Restore {
                source_name: source.name.clone(),
                reason: chain(&e),
            })?;

        info!("Restore of '{}' completed", source.name);
        Ok(())
    }

    /// Try each storage target in configured order, stopping at the first success
    pub fn fetch(&self, object: &str, dest_dir: &Path) -> Result<PathBuf, BackupError> {
        let mut attempts = Vec::new();

        for backend in self.backends {
            match fetch_from(backend.as_ref(), object, dest_dir) {
                Ok(path) => {
                    info!("Fetched '{}' from '{}'", object, backend.label());
                    return Ok(path);
                }
                Err(e) => {
                    warn!("Could not fetch '{}' from '{}': {:#}", object, backend.label(), e);
                    attempts.push(FetchAttempt {
                        backend: backend.label().to_string(),
                        reason: chain(&e),
                    });
                }
            }
        }

        debug!("All {} storage target(s) failed for '{}'", attempts.len(), object);
        Err(BackupError::RestoreFetchExhausted {
            object: object.to_string(),
            attempts,
        })
    }
}

fn fetch_from(backend: &dyn StorageBackend, object: &str, dest_dir: &Path) -> Result<PathBuf> {
    let token = backend.authenticate()?;
    backend.fetch(token.as_ref(), object, dest_dir)
}
