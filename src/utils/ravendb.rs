//! RavenDB server HTTP client
//!
//! Only the two read-only endpoints the engine needs: the database listing used
//! to expand multi-tenant sources, and per-database collection stats used to
//! narrow a collection filter before dumping.

use crate::config::RavenDbEndpoint;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use tracing::debug;

/// One entry of `GET /databases`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Disabled", default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
struct DatabasesResponse {
    #[serde(rename = "Databases")]
    databases: Vec<DatabaseRecord>,
}

#[derive(Debug, Deserialize)]
struct CollectionStatsResponse {
    #[serde(rename = "Collections")]
    collections: BTreeMap<String, serde_json::Value>,
}

/// Read-only RavenDB operations, enabling mocking in tests
pub trait RavenDbApi: Send + Sync {
    /// List every database on the server
    fn list_databases(&self, endpoint: &RavenDbEndpoint) -> Result<Vec<DatabaseRecord>>;

    /// Names of the collections that exist in `database`
    fn collection_names(&self, endpoint: &RavenDbEndpoint, database: &str) -> Result<Vec<String>>;
}

/// Client authenticating with the endpoint's certificate/key pair
#[derive(Debug, Clone)]
pub struct RavenDbClient {
    timeout: Duration,
}

impl RavenDbClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn http_client(&self, endpoint: &RavenDbEndpoint) -> Result<reqwest::blocking::Client> {
        let mut pem = fs::read(&endpoint.key)
            .with_context(|| format!("Failed to read client key: {:?}", endpoint.key))?;
        pem.push(b'\n');
        pem.extend(
            fs::read(&endpoint.cert)
                .with_context(|| format!("Failed to read client certificate: {:?}", endpoint.cert))?,
        );

        let identity = reqwest::Identity::from_pem(&pem)
            .context("Failed to load RavenDB client certificate")?;

        reqwest::blocking::Client::builder()
            .identity(identity)
            .timeout(self.timeout)
            .build()
            .context("Failed to create HTTP client")
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &RavenDbEndpoint,
        url: &str,
    ) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .http_client(endpoint)?
            .get(url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("GET {} returned status {}: {}", url, status, body);
        }

        response
            .json()
            .with_context(|| format!("Unexpected response body from {}", url))
    }
}

impl RavenDbApi for RavenDbClient {
    fn list_databases(&self, endpoint: &RavenDbEndpoint) -> Result<Vec<DatabaseRecord>> {
        let url = databases_url(&endpoint.url);
        let response: DatabasesResponse = self.get_json(endpoint, &url)?;
        Ok(response.databases)
    }

    fn collection_names(&self, endpoint: &RavenDbEndpoint, database: &str) -> Result<Vec<String>> {
        let url = collection_stats_url(&endpoint.url, database);
        let response: CollectionStatsResponse = self.get_json(endpoint, &url)?;
        Ok(response.collections.into_keys().collect())
    }
}

pub fn databases_url(base: &str) -> String {
    format!("{}/databases", base.trim_end_matches('/'))
}

pub fn collection_stats_url(base: &str, database: &str) -> String {
    format!(
        "{}/databases/{}/collections/stats",
        base.trim_end_matches('/'),
        database
    )
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory RavenDB server
    #[derive(Clone, Default)]
    pub struct MockRavenDb {
        databases: Arc<Mutex<HashMap<String, Vec<DatabaseRecord>>>>,
        collections: Arc<Mutex<HashMap<String, Vec<String>>>>,
        failing: Arc<Mutex<Vec<String>>>,
        /// Recorded endpoint URLs of listing calls
        pub listing_calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockRavenDb {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve this listing for an endpoint URL
        pub fn with_databases(self, url: &str, databases: Vec<DatabaseRecord>) -> Self {
            self.databases
                .lock()
                .unwrap()
                .insert(url.to_string(), databases);
            self
        }

        /// Serve these collections for a database
        pub fn with_collections(self, database: &str, collections: &[&str]) -> Self {
            self.collections.lock().unwrap().insert(
                database.to_string(),
                collections.iter().map(|c| c.to_string()).collect(),
            );
            self
        }

        /// Make every call against this endpoint URL fail
        pub fn failing(self, url: &str) -> Self {
            self.failing.lock().unwrap().push(url.to_string());
            self
        }

        pub fn listing_count(&self) -> usize {
            self.listing_calls.lock().unwrap().len()
        }

        fn check(&self, endpoint: &RavenDbEndpoint) -> Result<()> {
            if self.failing.lock().unwrap().contains(&endpoint.url) {
                anyhow::bail!("connection refused: {}", endpoint.url);
            }
            Ok(())
        }
    }

    impl RavenDbApi for MockRavenDb {
        fn list_databases(&self, endpoint: &RavenDbEndpoint) -> Result<Vec<DatabaseRecord>> {
            self.listing_calls
                .lock()
                .unwrap()
                .push(endpoint.url.clone());
            self.check(endpoint)?;
            Ok(self
                .databases
                .lock()
                .unwrap()
                .get(&endpoint.url)
                .cloned()
                .unwrap_or_default())
        }

        fn collection_names(&self, endpoint: &RavenDbEndpoint, database: &str) -> Result<Vec<String>> {
            self.check(endpoint)?;
            self.collections
                .lock()
                .unwrap()
                .get(database)
                .cloned()
                .with_context(|| format!("database '{}' does not exist", database))
        }
    }
}
