use thiserror::Error;

/// Failure of a backup or restore, tagged by the stage that failed
///
/// The per-source variants (`Dump`, `Upload`, `Rotation`, `Resolution`) are
/// caught by the backup orchestrator and never end a batch. The restore
/// variants end the run.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Dump of '{source_name}' failed: {reason}")]
    Dump { source_name: String, reason: String },

    #[error("Upload of '{source_name}' to '{backend}' failed: {reason}")]
    Upload {
        source_name: String,
        backend: String,
        reason: String,
    },

    #[error("Rotation of '{source_name}' on '{backend}' failed: {reason}")]
    Rotation {
        source_name: String,
        backend: String,
        reason: String,
    },

    #[error("Could not list databases for '{source_name}': {reason}")]
    Resolution { source_name: String, reason: String },

    #[error("No configured source named '{0}'")]
    RestoreSourceNotFound(String),

    #[error("No storage target produced '{object}' ({})", describe_attempts(.attempts))]
    RestoreFetchExhausted {
        object: String,
        attempts: Vec<FetchAttempt>,
    },

    #[error("Restore of '{source_name}' failed: {reason}")]
    Restore { source_name: String, reason: String },
}

/// One storage target's failed attempt to produce a restore object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub backend: String,
    pub reason: String,
}

fn describe_attempts(attempts: &[FetchAttempt]) -> String {
    if attempts.is_empty() {
        return "no storage targets configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.backend, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl BackupError {
    /// Short stage name, used in reports
    pub fn stage(&self) -> &'static str {
        match self {
            BackupError::Dump { .. } => "dump",
            BackupError::Upload { .. } => "upload",
            BackupError::Rotation { .. } => "rotation",
            BackupError::Resolution { .. } => "resolution",
            BackupError::RestoreSourceNotFound(_) => "restore-lookup",
            BackupError::RestoreFetchExhausted { .. } => "restore-fetch",
            BackupError::Restore { .. } => "restore",
        }
    }
}

/// Full error chain on one line
pub(crate) fn chain(error: &anyhow::Error) -> String {
    format!("{:#}", error)
}
