//! Test fixtures and sample data
//!
//! Shell-script stand-ins for the dump tool and rclone, plus sample listings.
//! The scripts need a POSIX shell.

use dumptruck::utils::ravendb::DatabaseRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Database name that makes the fake dump tool exit nonzero
pub const FAILING_DATABASE: &str = "broken_db";

/// Write an executable script
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create script dir");
    let path = dir.join(name);
    fs::write(&path, body).expect("Failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
    }

    path
}

/// Fake dump tool
///
/// Appends its arguments to `calls.log` next to itself, writes the output file
/// for dump operations (argument 7 for both dump shapes), and fails whenever an
/// argument equals [`FAILING_DATABASE`].
pub fn fake_dump_tool(dir: &Path) -> PathBuf {
    let log = dir.join("calls.log");
    let body = format!(
        r#"#!/bin/sh
echo "$@" >> "{log}"
for arg in "$@"; do
  if [ "$arg" = "{failing}" ]; then
    echo "dump of $arg failed" >&2
    exit 1
  fi
done
case "$1" in
  dump_other|dump_ravendb) echo "encrypted dump" > "$7" ;;
esac
exit 0
"#,
        log = log.display(),
        failing = FAILING_DATABASE,
    );
    write_script(dir, "dump.sh", &body)
}

/// Recorded invocations of the fake dump tool, one line per call
pub fn dump_tool_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .map(|s| s.lines().map(String::from).collect())
        .unwrap_or_default()
}

/// Fake rclone mapping `remote:path` onto `<root>/path`
pub fn fake_rclone(dir: &Path, root: &Path) -> PathBuf {
    fs::create_dir_all(root).expect("Failed to create remote root");
    let body = format!(
        r#"#!/bin/sh
root="{root}"
if [ "$1" = "--config" ]; then shift 2; fi
op="$1"; shift
local_path() {{ echo "$root/${{1#*:}}"; }}
case "$op" in
  copy)
    case "$1" in
      *:*) cp "$(local_path "$1")" "$2/" ;;
      *) mkdir -p "$(local_path "$2")" && cp "$1" "$(local_path "$2")/" ;;
    esac ;;
  lsf)
    if [ -d "$(local_path "$1")" ]; then ls -1 "$(local_path "$1")"; fi ;;
  delete)
    rm -f "$(local_path "$1")" ;;
  *)
    echo "unsupported: $op" >&2
    exit 2 ;;
esac
"#,
        root = root.display(),
    );
    write_script(dir, "rclone", &body)
}

/// Object names stored by the fake rclone under `<root>/<target>`, sorted
pub fn remote_objects(root: &Path, target: &str) -> Vec<String> {
    let mut objects: Vec<String> = fs::read_dir(root.join(target))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    objects.sort();
    objects
}

/// Listing from the multi-tenant example: one enabled match, one disabled, one other
pub fn sample_tenant_listing() -> Vec<DatabaseRecord> {
    vec![
        DatabaseRecord {
            name: "tenant_a".to_string(),
            disabled: false,
        },
        DatabaseRecord {
            name: "tenant_b".to_string(),
            disabled: true,
        },
        DatabaseRecord {
            name: "other".to_string(),
            disabled: false,
        },
    ]
}

/// Dated artifact names for one source, oldest first
pub fn sample_artifacts(name: &str, days: u32) -> Vec<String> {
    (1..=days)
        .map(|day| format!("{}.202401{:02}-0300.gz.enc", name, day))
        .collect()
}

/// Minimal valid config TOML
pub fn minimal_config_toml() -> &'static str {
    r#"
encryption = "key"

[[sources]]
name = "orders"
dbtype = "postgres"
host = "db.internal"
username = "backup"
password = "pw"
database = "orders_db"

[[storage]]
type = "rclone"
remote = "b2"
target = "dumps"
"#
}
