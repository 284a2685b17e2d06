//! File-based locking to prevent overlapping runs sharing a staging directory

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_FILE_NAME: &str = ".dumptruck.lock";

/// Lock file path for a staging directory
pub fn lock_path(staging_dir: &Path) -> PathBuf {
    staging_dir.join(LOCK_FILE_NAME)
}

/// Run `f` while holding the exclusive staging lock
///
/// Returns an error without running `f` if another run holds the lock.
pub fn with_staging_lock<T, F>(staging_dir: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    std::fs::create_dir_all(staging_dir)
        .with_context(|| format!("Failed to create staging directory: {:?}", staging_dir))?;

    let path = lock_path(staging_dir);
    debug!("Attempting to acquire lock: {:?}", path);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file: {:?}", path))?;

    let mut lock = RwLock::new(file);
    let _guard = lock.try_write().with_context(|| {
        format!(
            "Another dumptruck run is using staging directory {:?} (lock held)",
            staging_dir
        )
    })?;

    info!("Acquired staging lock: {:?}", path);
    let result = f();
    debug!("Releasing staging lock: {:?}", path);

    Ok(result)
}
