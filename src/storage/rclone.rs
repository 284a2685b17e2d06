//! rclone remote storage backend
//!
//! Credentials live in rclone's own profile; every operation is a single rclone
//! invocation against `remote:target`.

use super::{fetch_destination, AuthToken, StorageBackend};
use crate::config::RcloneTarget;
use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct RcloneBackend {
    label: String,
    target: RcloneTarget,
    binary: String,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl RcloneBackend {
    pub fn new(
        label: String,
        target: RcloneTarget,
        binary: &str,
        executor: Arc<dyn CommandExecutor>,
        timeout: Duration,
    ) -> Self {
        Self {
            label,
            target,
            binary: binary.to_string(),
            executor,
            timeout,
        }
    }

    /// `remote:target`
    pub fn location(&self) -> String {
        format!("{}:{}", self.target.remote, self.target.target)
    }

    /// `remote:target/object`
    pub fn object_location(&self, object: &str) -> String {
        format!("{}/{}", self.location().trim_end_matches('/'), object)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let config = self
            .target
            .config
            .as_ref()
            .map(|p| p.display().to_string());

        let mut full_args: Vec<&str> = Vec::with_capacity(args.len() + 2);
        if let Some(ref config) = config {
            full_args.push("--config");
            full_args.push(config);
        }
        full_args.extend_from_slice(args);

        self.executor
            .run_stdout(&self.binary, &full_args, self.timeout)
    }
}

impl StorageBackend for RcloneBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn authenticate(&self) -> Result<Option<AuthToken>> {
        Ok(None)
    }

    fn upload(&self, _token: Option<&AuthToken>, artifact: &Path) -> Result<()> {
        let source = artifact.display().to_string();
        let destination = self.location();

        info!("Uploading {:?} to {}", artifact, destination);
        self.run(&["copy", &source, &destination])
            .with_context(|| format!("rclone copy to {} failed", destination))?;
        Ok(())
    }

    fn list(&self, _token: Option<&AuthToken>) -> Result<Vec<String>> {
        let location = self.location();
        let stdout = self
            .run(&["lsf", &location])
            .with_context(|| format!("rclone lsf {} failed", location))?;

        let objects: Vec<String> = stdout.split_whitespace().map(String::from).collect();
        debug!("{} objects at {}", objects.len(), location);
        Ok(objects)
    }

    fn delete(&self, _token: Option<&AuthToken>, object: &str) -> Result<()> {
        let location = self.object_location(object);
        self.run(&["delete", &location])
            .with_context(|| format!("rclone delete {} failed", location))?;
        Ok(())
    }

    fn fetch(&self, _token: Option<&AuthToken>, object: &str, dest_dir: &Path) -> Result<PathBuf> {
        let path = fetch_destination(dest_dir, object)?;
        let location = self.object_location(object);
        let dest = dest_dir.display().to_string();

        info!("Fetching {} into {:?}", location, dest_dir);
        self.run(&["copy", &location, &dest])
            .with_context(|| format!("rclone copy from {} failed", location))?;

        if !path.exists() {
            anyhow::bail!("rclone reported success but {:?} does not exist", path);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::executor::mock::{MockExecutor, MockResponse};
    use tempfile::TempDir;

    fn backend(executor: &MockExecutor, config: Option<&str>) -> RcloneBackend {
        RcloneBackend::new(
            "offsite".to_string(),
            RcloneTarget {
                name: Some("offsite".to_string()),
                remote: "b2".to_string(),
                target: "db-dumps".to_string(),
                config: config.map(PathBuf::from),
            },
            "rclone",
            Arc::new(executor.clone()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_upload_uses_copy_with_profile() {
        let executor = MockExecutor::new();
        let backend = backend(&executor, Some("rclone.conf"));

        backend
            .upload(None, Path::new("/stage/orders.20240101-0000.gz.enc"))
            .unwrap();

        let calls = executor.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec![
                "--config",
                "rclone.conf",
                "copy",
                "/stage/orders.20240101-0000.gz.enc",
                "b2:db-dumps"
            ]
        );
        assert_eq!(calls[0].timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_list_splits_output() {
        let executor = MockExecutor::new().expect_with_arg(
            "rclone",
            "lsf",
            MockResponse::stdout("orders.20240101-0000.gz.enc\norders.20240102-0000.gz.enc\n"),
        );
        let backend = backend(&executor, None);

        let objects = backend.list(None).unwrap();
        assert_eq!(
            objects,
            vec!["orders.20240101-0000.gz.enc", "orders.20240102-0000.gz.enc"]
        );
        assert_eq!(executor.get_calls()[0].args, vec!["lsf", "b2:db-dumps"]);
    }

    #[test]
    fn test_delete_addresses_object() {
        let executor = MockExecutor::new();
        let backend = backend(&executor, None);

        backend.delete(None, "orders.20240101-0000.gz.enc").unwrap();

        assert_eq!(
            executor.get_calls()[0].args,
            vec!["delete", "b2:db-dumps/orders.20240101-0000.gz.enc"]
        );
    }

    #[test]
    fn test_failed_invocation_is_error() {
        let executor = MockExecutor::new().expect("rclone", MockResponse::failure("403 Forbidden"));
        let backend = backend(&executor, None);

        let err = backend.upload(None, Path::new("x.gz.enc")).unwrap_err();
        assert!(format!("{:#}", err).contains("403 Forbidden"));
    }

    #[test]
    fn test_fetch_requires_file_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let executor = MockExecutor::new();
        let backend = backend(&executor, None);

        assert!(backend.fetch(None, "orders.1.gz.enc", temp_dir.path()).is_err());

        std::fs::write(temp_dir.path().join("orders.1.gz.enc"), "data").unwrap();
        let path = backend.fetch(None, "orders.1.gz.enc", temp_dir.path()).unwrap();
        assert_eq!(path, temp_dir.path().join("orders.1.gz.enc"));
    }

    #[test]
    fn test_fetch_rejects_paths_before_invoking_rclone() {
        let temp_dir = TempDir::new().unwrap();
        let executor = MockExecutor::new();
        let backend = backend(&executor, None);

        assert!(backend.fetch(None, "../orders.1.gz.enc", temp_dir.path()).is_err());
        assert!(backend.fetch(None, "nested/orders.1.gz.enc", temp_dir.path()).is_err());
        assert!(!executor.was_called("rclone"));
    }

    #[test]
    fn test_authenticate_returns_no_token() {
        let executor = MockExecutor::new();
        assert!(backend(&executor, None).authenticate().unwrap().is_none());
        assert!(!executor.was_called("rclone"));
    }
}
