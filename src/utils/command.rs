//! Child process execution with a deadline

use anyhow::{Context, Result};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

/// Run a program to completion within `timeout`
///
/// Arguments are never logged: dump and restore invocations carry credentials
/// positionally. The child is killed when the deadline passes.
pub fn run_with_deadline(program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(
        "Running {} {} ({} args, deadline {:?})",
        program,
        args.first().copied().unwrap_or_default(),
        args.len(),
        timeout
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime for command deadline")?;

    let output = runtime.block_on(async {
        let mut child = tokio::process::Command::from(cmd);
        child.kill_on_drop(true);

        match tokio::time::timeout(timeout, child.output()).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => Err(anyhow::anyhow!("{} timed out after {:?}", program, timeout)),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            "{} exited with {:?}: {}",
            program,
            output.status.code(),
            stderr.trim_end()
        );
        anyhow::bail!(
            "{} failed with exit code {:?}: {}",
            program,
            output.status.code(),
            stderr.trim_end()
        );
    }

    Ok(output)
}
