//! RavenDB dump strategy
//!
//! ```text
//! dump_ravendb    <url> <cert> <key> <database> <collections-json> <output> <encryption>
//! restore_ravendb <url> <cert> <key> <database> <input> <encryption> [tunnel]
//! ```
//!
//! `collections-json` is `null` for a full export, otherwise a JSON array of
//! collection names that exist in the database.

use super::DumpStrategy;
use crate::config::RavenDbConnection;
use crate::utils::artifact::ArtifactEncoding;
use crate::utils::ravendb::RavenDbApi;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

pub struct RavenDbStrategy<'a> {
    connection: &'a RavenDbConnection,
    api: &'a dyn RavenDbApi,
}

impl<'a> RavenDbStrategy<'a> {
    pub fn new(connection: &'a RavenDbConnection, api: &'a dyn RavenDbApi) -> Self {
        Self { connection, api }
    }

    /// Collections to request, or `None` for all of them
    ///
    /// A configured filter is intersected with the collections that actually
    /// exist so the export never asks for a missing collection.
    pub fn resolve_collections(&self) -> Result<Option<Vec<String>>> {
        let wanted = match self.connection.collections {
            Some(ref wanted) => wanted,
            None => return Ok(None),
        };

        let existing = self
            .api
            .collection_names(&self.connection.endpoint, &self.connection.database)
            .with_context(|| {
                format!(
                    "Failed to query collections of database '{}'",
                    self.connection.database
                )
            })?;

        let selected: Vec<String> = wanted
            .iter()
            .filter(|name| existing.contains(*name))
            .cloned()
            .collect();

        for missing in wanted.iter().filter(|name| !existing.contains(*name)) {
            debug!(
                "Collection '{}' does not exist in '{}', skipping",
                missing, self.connection.database
            );
        }

        if selected.is_empty() {
            warn!(
                "None of the configured collections exist in '{}', exporting all collections",
                self.connection.database
            );
            return Ok(None);
        }

        Ok(Some(selected))
    }
}

impl DumpStrategy for RavenDbStrategy<'_> {
    fn encoding(&self) -> ArtifactEncoding {
        ArtifactEncoding::RavenDbDump
    }

    fn dump_args(&self, encryption: &str, output: &Path) -> Result<Vec<String>> {
        let collections = self.resolve_collections()?;
        let collections =
            serde_json::to_string(&collections).context("Failed to encode collection list")?;

        let conn = self.connection;
        Ok(vec![
            "dump_ravendb".to_string(),
            conn.endpoint.url.clone(),
            conn.endpoint.cert.display().to_string(),
            conn.endpoint.key.display().to_string(),
            conn.database.clone(),
            collections,
            output.display().to_string(),
            encryption.to_string(),
        ])
    }

    fn restore_args(&self, encryption: &str, input: &Path, database: &str) -> Vec<String> {
        let conn = self.connection;
        let mut args = vec![
            "restore_ravendb".to_string(),
            conn.endpoint.url.clone(),
            conn.endpoint.cert.display().to_string(),
            conn.endpoint.key.display().to_string(),
            database.to_string(),
            input.display().to_string(),
            encryption.to_string(),
        ];
        if let Some(ref tunnel) = conn.tunnel {
            args.push(tunnel.clone());
        }
        args
    }

    fn name(&self) -> &'static str {
        "ravendb"
    }
}
