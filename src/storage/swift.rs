//! OpenStack Swift storage backend with Keystone v3 password authentication

use super::{fetch_destination, AuthToken, StorageBackend};
use crate::config::SwiftTarget;
use anyhow::{Context, Result};
use md5::{Digest, Md5};
use reqwest::blocking::{Body, Client};
use reqwest::StatusCode;
use serde_json::json;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

pub struct SwiftBackend {
    label: String,
    target: SwiftTarget,
    client: Client,
}

impl SwiftBackend {
    pub fn new(label: String, target: SwiftTarget, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            label,
            target,
            client,
        })
    }

    /// Container URL with `object` appended as one percent-encoded segment
    fn object_url(&self, object: &str) -> Result<reqwest::Url> {
        let container = &self.target.container_url;
        let mut url = reqwest::Url::parse(container)
            .with_context(|| format!("Invalid container URL: {}", container))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Container URL cannot carry a path: {}", container))?
            .pop_if_empty()
            .push(object);
        Ok(url)
    }

    fn require_token<'a>(&self, token: Option<&'a AuthToken>) -> Result<&'a AuthToken> {
        token.with_context(|| format!("'{}' requires authentication first", self.label))
    }

    /// Keystone v3 password authentication body scoped to the project
    pub fn auth_payload(target: &SwiftTarget) -> serde_json::Value {
        json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": target.username,
                            "domain": {"id": target.user_domain_id},
                            "password": target.password
                        }
                    }
                },
                "scope": {
                    "project": {"id": target.project_id}
                }
            }
        })
    }
}

/// Hex MD5 of a file's contents, streamed
pub fn file_md5(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn expect_status(response: reqwest::blocking::Response, expected: StatusCode, action: &str) -> Result<()> {
    let status = response.status();
    if status != expected {
        let body = response.text().unwrap_or_default();
        anyhow::bail!(
            "Unexpected status {} {} (expected {}): {}",
            status,
            action,
            expected,
            body.trim()
        );
    }
    Ok(())
}

impl StorageBackend for SwiftBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn authenticate(&self) -> Result<Option<AuthToken>> {
        let url = format!("{}/auth/tokens", self.target.auth_url.trim_end_matches('/'));
        debug!("Authenticating against {}", url);

        let response = self
            .client
            .post(&url)
            .json(&Self::auth_payload(&self.target))
            .send()
            .with_context(|| format!("Authentication request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Authentication against {} failed with status {}", url, status);
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .context("Authentication response carries no X-Subject-Token header")?
            .to_str()
            .context("X-Subject-Token header is not valid text")?;

        Ok(Some(AuthToken::new(token)))
    }

    fn upload(&self, token: Option<&AuthToken>, artifact: &Path) -> Result<()> {
        let token = self.require_token(token)?;
        let object = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Artifact path has no file name: {:?}", artifact))?;

        let checksum = file_md5(artifact)?;
        let file = File::open(artifact).with_context(|| format!("Failed to open {:?}", artifact))?;
        let length = file.metadata()?.len();

        let url = self.object_url(&object)?;
        info!("Uploading {} ({} bytes) to {}", object, length, self.label);

        let response = self
            .client
            .put(url.clone())
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .header("ETag", checksum)
            .header("Content-Length", length.to_string())
            .body(Body::sized(file, length))
            .send()
            .with_context(|| format!("Upload to {} failed", url))?;

        expect_status(response, StatusCode::CREATED, &format!("uploading {}", object))
    }

    fn list(&self, token: Option<&AuthToken>) -> Result<Vec<String>> {
        let token = self.require_token(token)?;
        let response = self
            .client
            .get(&self.target.container_url)
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .with_context(|| format!("Listing {} failed", self.target.container_url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Listing {} returned status {}", self.target.container_url, status);
        }

        let body = response.text().context("Failed to read container listing")?;
        Ok(body
            .split('\n')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect())
    }

    fn delete(&self, token: Option<&AuthToken>, object: &str) -> Result<()> {
        let token = self.require_token(token)?;
        let url = self.object_url(object)?;

        let response = self
            .client
            .delete(url.clone())
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .with_context(|| format!("Delete of {} failed", url))?;

        expect_status(response, StatusCode::NO_CONTENT, &format!("deleting {}", object))
    }

    fn fetch(&self, token: Option<&AuthToken>, object: &str, dest_dir: &Path) -> Result<PathBuf> {
        let token = self.require_token(token)?;
        let path = fetch_destination(dest_dir, object)?;
        let url = self.object_url(object)?;

        let mut response = self
            .client
            .get(url.clone())
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .with_context(|| format!("Download of {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Download of {} returned status {}", url, status);
        }

        let mut file =
            File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let written = io::copy(&mut response, &mut file)
            .with_context(|| format!("Failed to write {:?}", path))?;

        info!("Fetched {} ({} bytes) from {}", object, written, self.label);
        Ok(path)
    }
}
