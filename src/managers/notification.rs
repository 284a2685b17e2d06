//! Push-gateway notification manager
//!
//! Reports the outcome of each backup as Prometheus text exposition pushed to
//! `{url}/metrics/job/dumptruck/instance/{source}` with basic auth.
//!
//! Delivery is best-effort: a failed push is logged and never fails a backup.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{MonitorConfig, Source};

/// Metrics job name under which every source is reported
pub const JOB_NAME: &str = "dumptruck";

/// Value of `backup_status` after a failed attempt
pub const FAILURE_STATUS: i32 = -1;

/// Transport for a metrics body
pub trait MetricsPush: Send + Sync {
    fn push(&self, instance: &str, body: &str) -> Result<()>;
}

/// Blocking client for a Prometheus push gateway
pub struct PushGateway {
    config: MonitorConfig,
    client: reqwest::blocking::Client,
}

impl PushGateway {
    pub fn new(config: MonitorConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, client })
    }
}

/// Push URL for one source; the instance is percent-encoded as one path segment
pub fn push_url(base: &str, instance: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .with_context(|| format!("Invalid monitor URL: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Monitor URL cannot carry a path: {}", base))?
        .pop_if_empty()
        .extend(["metrics", "job", JOB_NAME, "instance", instance]);
    Ok(url)
}

impl MetricsPush for PushGateway {
    fn push(&self, instance: &str, body: &str) -> Result<()> {
        let url = push_url(&self.config.url, instance)?;

        let response = self
            .client
            .post(url.clone())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "text/plain; version=0.0.4")
            .body(body.to_string())
            .send()
            .with_context(|| format!("Failed to push metrics to {}", url))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        debug!("Push gateway answered {}: {}", status, text);

        if !status.is_success() {
            anyhow::bail!("Push gateway returned {}: {}", status, text);
        }
        Ok(())
    }
}

/// Sends success/failure metrics for sources, when monitoring is configured
#[derive(Clone, Default)]
pub struct NotificationManager {
    transport: Option<Arc<dyn MetricsPush>>,
}

impl NotificationManager {
    /// Build from the optional `[monitor]` section
    pub fn new(monitor: Option<&MonitorConfig>, timeout: Duration) -> Result<Self> {
        let transport = match monitor {
            Some(config) => {
                Some(Arc::new(PushGateway::new(config.clone(), timeout)?) as Arc<dyn MetricsPush>)
            }
            None => None,
        };
        Ok(Self { transport })
    }

    pub fn with_transport(transport: Arc<dyn MetricsPush>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Report a completed backup at `completed_at` (unix seconds)
    pub fn send_success(&self, source: &Source, completed_at: f64) {
        let (database, dbtype) = labels(source);
        self.send(&source.name, &success_payload(database, dbtype, completed_at));
    }

    /// Report a failed backup attempt
    pub fn send_failure(&self, source: &Source) {
        let (database, dbtype) = labels(source);
        self.send(&source.name, &failure_payload(database, dbtype));
    }

    fn send(&self, instance: &str, body: &str) {
        let Some(ref transport) = self.transport else {
            debug!("Monitoring not configured, skipping notification for '{}'", instance);
            return;
        };

        match transport.push(instance, body) {
            Ok(()) => info!("Pushed backup metrics for '{}'", instance),
            Err(e) => warn!("Failed to push metrics for '{}': {:#}", instance, e),
        }
    }
}

/// Umbrella sources have no database and report an empty label
fn labels(source: &Source) -> (&str, &str) {
    (source.database().unwrap_or_default(), source.dbtype())
}

/// Metrics body for a successful backup
pub fn success_payload(database: &str, dbtype: &str, completed_at: f64) -> String {
    let labels = label_set(database, dbtype);
    format!(
        "# TYPE backup_time_seconds gauge\n\
         # HELP backup_time_seconds Last Unix time when this source was backed up.\n\
         backup_time_seconds{labels} {completed_at}\n\
         {status}",
        status = status_block(&labels, 1),
    )
}

/// Metrics body for a failed backup: status only
pub fn failure_payload(database: &str, dbtype: &str) -> String {
    status_block(&label_set(database, dbtype), FAILURE_STATUS)
}

fn status_block(labels: &str, value: i32) -> String {
    format!(
        "# TYPE backup_status gauge\n\
         # HELP backup_status Indicates success/failure of the last backup attempt.\n\
         backup_status{labels} {value}\n"
    )
}

fn label_set(database: &str, dbtype: &str) -> String {
    format!(
        "{{database=\"{}\",type=\"{}\"}}",
        escape_label(database),
        escape_label(dbtype)
    )
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Recorded push
    #[derive(Clone, Debug, PartialEq)]
    pub struct Push {
        pub instance: String,
        pub body: String,
    }

    /// Records every push; optionally fails them all
    #[derive(Clone, Default)]
    pub struct RecordingPush {
        pub pushes: Arc<Mutex<Vec<Push>>>,
        fail: bool,
    }

    impl RecordingPush {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn pushes(&self) -> Vec<Push> {
            self.pushes.lock().unwrap().clone()
        }

        /// Bodies pushed for one instance, in order
        pub fn bodies_for(&self, instance: &str) -> Vec<String> {
            self.pushes()
                .into_iter()
                .filter(|p| p.instance == instance)
                .map(|p| p.body)
                .collect()
        }
    }

    impl MetricsPush for RecordingPush {
        fn push(&self, instance: &str, body: &str) -> Result<()> {
            self.pushes.lock().unwrap().push(Push {
                instance: instance.to_string(),
                body: body.to_string(),
            });
            if self.fail {
                anyhow::bail!("push gateway unreachable");
            }
            Ok(())
        }
    }
}
