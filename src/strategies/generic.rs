//! Generic dump strategy
//!
//! Handles every engine the dump tool supports through its `dump_other` and
//! `restore_other` operations. Connection fields are passed positionally:
//!
//! ```text
//! dump_other    <dbtype> <host> <username> <password> <database> <output> <encryption> <tunnel>
//! restore_other <dbtype> <host> <username> <password> <database> <input> <encryption> [tunnel]
//! ```
//!
//! The dump operation always receives the tunnel slot (empty when unset); the
//! restore operation only receives it when one is configured.

use super::DumpStrategy;
use crate::config::GenericConnection;
use crate::utils::artifact::ArtifactEncoding;
use anyhow::Result;
use std::path::Path;

pub struct GenericStrategy<'a> {
    connection: &'a GenericConnection,
}

impl<'a> GenericStrategy<'a> {
    pub fn new(connection: &'a GenericConnection) -> Self {
        Self { connection }
    }
}

impl DumpStrategy for GenericStrategy<'_> {
    fn encoding(&self) -> ArtifactEncoding {
        ArtifactEncoding::Gzip
    }

    fn dump_args(&self, encryption: &str, output: &Path) -> Result<Vec<String>> {
        let conn = self.connection;
        Ok(vec![
            "dump_other".to_string(),
            conn.dbtype.clone(),
            conn.host.clone(),
            conn.username.clone(),
            conn.password.clone(),
            conn.database.clone(),
            output.display().to_string(),
            encryption.to_string(),
            conn.tunnel.clone().unwrap_or_default(),
        ])
    }

    fn restore_args(&self, encryption: &str, input: &Path, database: &str) -> Vec<String> {
        let conn = self.connection;
        let mut args = vec![
            "restore_other".to_string(),
            conn.dbtype.clone(),
            conn.host.clone(),
            conn.username.clone(),
            conn.password.clone(),
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
        "generic"
    }
}
