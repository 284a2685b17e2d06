//! Storage backends
//!
//! Every configured storage target is driven through [`StorageBackend`], a
//! narrow capability set: authenticate, upload, list, delete and fetch. Two
//! variants exist: a Keystone-authenticated Swift container and an rclone
//! remote.

pub mod rclone;
pub mod retention;
pub mod swift;

use crate::config::{GlobalConfig, StorageTarget};
use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use rclone::RcloneBackend;
pub use retention::select_for_deletion;
pub use swift::SwiftBackend;

/// Bearer token returned by a backend's authentication step
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Uniform capability set of a storage target
pub trait StorageBackend: Send + Sync {
    /// Label used in logs and reports
    fn label(&self) -> &str;

    /// Obtain a session token; `None` for backends with preconfigured credentials
    fn authenticate(&self) -> Result<Option<AuthToken>>;

    /// Upload a local artifact under its file name
    fn upload(&self, token: Option<&AuthToken>, artifact: &Path) -> Result<()>;

    /// List the names of every object at the target
    fn list(&self, token: Option<&AuthToken>) -> Result<Vec<String>>;

    /// Delete one object
    fn delete(&self, token: Option<&AuthToken>, object: &str) -> Result<()>;

    /// Download one object into `dest_dir`, returning the local path
    fn fetch(&self, token: Option<&AuthToken>, object: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Local path a fetched `object` lands at inside `dest_dir`
///
/// Only a bare file name is accepted, so a fetch can never write outside
/// `dest_dir`.
pub fn fetch_destination(dest_dir: &Path, object: &str) -> Result<PathBuf> {
    match Path::new(object).file_name() {
        Some(name) if name == object => Ok(dest_dir.join(name)),
        _ => anyhow::bail!("'{}' is not a plain object name", object),
    }
}

/// Apply the retention policy for `prefix` on one backend
///
/// Returns the names of the deleted objects. Stops at the first failed delete.
pub fn rotate(
    backend: &dyn StorageBackend,
    token: Option<&AuthToken>,
    prefix: &str,
    keep: usize,
) -> Result<Vec<String>> {
    let listing = backend
        .list(token)
        .with_context(|| format!("Failed to list objects on '{}'", backend.label()))?;

    let to_delete = select_for_deletion(&listing, prefix, keep);
    for object in &to_delete {
        backend
            .delete(token, object)
            .with_context(|| format!("Failed to delete '{}' from '{}'", object, backend.label()))?;
        info!("Rotated out '{}' on '{}'", object, backend.label());
    }

    Ok(to_delete)
}

/// Build one backend per configured storage target, in configured order
pub fn build_backends(
    targets: &[StorageTarget],
    global: &GlobalConfig,
    executor: Arc<dyn CommandExecutor>,
) -> Result<Vec<Box<dyn StorageBackend>>> {
    let http_timeout = Duration::from_secs(global.http_timeout_seconds);
    let command_timeout = Duration::from_secs(global.command_timeout_seconds);

    targets
        .iter()
        .map(|target| -> Result<Box<dyn StorageBackend>> {
            match target {
                StorageTarget::Swift(swift) => Ok(Box::new(SwiftBackend::new(
                    target.label(),
                    swift.clone(),
                    http_timeout,
                )?)),
                StorageTarget::Rclone(rclone) => Ok(Box::new(RcloneBackend::new(
                    target.label(),
                    rclone.clone(),
                    &global.rclone_binary,
                    executor.clone(),
                    command_timeout,
                ))),
            }
        })
        .collect()
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Recorded backend operation
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum BackendCall {
        Authenticate,
        Upload { object: String },
        List,
        Delete { object: String },
        Fetch { object: String },
    }

    #[derive(Default)]
    struct State {
        objects: BTreeSet<String>,
        calls: Vec<BackendCall>,
        fail_upload: bool,
        fail_delete: bool,
        fail_fetch: bool,
        fail_auth: bool,
    }

    /// In-memory backend; uploads add objects, deletes remove them
    #[derive(Clone)]
    pub struct MockBackend {
        label: String,
        state: Arc<Mutex<State>>,
    }

    impl MockBackend {
        pub fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                state: Arc::new(Mutex::new(State::default())),
            }
        }

        /// Pre-populate remote objects
        pub fn with_objects(self, objects: &[&str]) -> Self {
            self.state
                .lock()
                .unwrap()
                .objects
                .extend(objects.iter().map(|o| o.to_string()));
            self
        }

        pub fn failing_upload(self) -> Self {
            self.state.lock().unwrap().fail_upload = true;
            self
        }

        pub fn failing_delete(self) -> Self {
            self.state.lock().unwrap().fail_delete = true;
            self
        }

        pub fn failing_fetch(self) -> Self {
            self.state.lock().unwrap().fail_fetch = true;
            self
        }

        pub fn failing_auth(self) -> Self {
            self.state.lock().unwrap().fail_auth = true;
            self
        }

        /// Current remote object names, sorted
        pub fn objects(&self) -> Vec<String> {
            self.state.lock().unwrap().objects.iter().cloned().collect()
        }

        pub fn calls(&self) -> Vec<BackendCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn was_contacted(&self) -> bool {
            !self.state.lock().unwrap().calls.is_empty()
        }

        pub fn boxed(&self) -> Box<dyn StorageBackend> {
            Box::new(self.clone())
        }

        fn record(&self, call: BackendCall) {
            self.state.lock().unwrap().calls.push(call);
        }
    }

    impl StorageBackend for MockBackend {
        fn label(&self) -> &str {
            &self.label
        }

        fn authenticate(&self) -> Result<Option<AuthToken>> {
            self.record(BackendCall::Authenticate);
            if self.state.lock().unwrap().fail_auth {
                anyhow::bail!("authentication rejected by '{}'", self.label);
            }
            Ok(Some(AuthToken::new(format!("token-{}", self.label))))
        }

        fn upload(&self, _token: Option<&AuthToken>, artifact: &Path) -> Result<()> {
            let object = artifact
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .context("artifact path has no file name")?;
            self.record(BackendCall::Upload {
                object: object.clone(),
            });

            let mut state = self.state.lock().unwrap();
            if state.fail_upload {
                anyhow::bail!("unexpected status 500 uploading '{}'", object);
            }
            state.objects.insert(object);
            Ok(())
        }

        fn list(&self, _token: Option<&AuthToken>) -> Result<Vec<String>> {
            self.record(BackendCall::List);
            Ok(self.objects())
        }

        fn delete(&self, _token: Option<&AuthToken>, object: &str) -> Result<()> {
            self.record(BackendCall::Delete {
                object: object.to_string(),
            });

            let mut state = self.state.lock().unwrap();
            if state.fail_delete {
                anyhow::bail!("unexpected status 500 deleting '{}'", object);
            }
            state.objects.remove(object);
            Ok(())
        }

        fn fetch(&self, _token: Option<&AuthToken>, object: &str, dest_dir: &Path) -> Result<PathBuf> {
            self.record(BackendCall::Fetch {
                object: object.to_string(),
            });

            let state = self.state.lock().unwrap();
            if state.fail_fetch {
                anyhow::bail!("fetch of '{}' failed on '{}'", object, self.label);
            }
            if !state.objects.contains(object) {
                anyhow::bail!("object '{}' not found on '{}'", object, self.label);
            }

            let path = fetch_destination(dest_dir, object)?;
            std::fs::write(&path, format!("{} from {}", object, self.label))?;
            Ok(path)
        }
    }
}
