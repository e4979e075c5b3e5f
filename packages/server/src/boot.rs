//! Boot-file loading and replay.
//!
//! A boot file is a JSON array of operations applied to the controller
//! before the endpoint starts serving. Replay happens inside the boot
//! window, so boot-only operations such as `add-host` are legal here.

use std::path::Path;

use anyhow::{bail, Context};
use bosun_core::{ModelValue, PathAddress};
use serde::Deserialize;
use tracing::info;

use crate::pipeline::{ManagementController, OperationRequest};

/// One operation in a boot file.
#[derive(Debug, Deserialize)]
struct BootEntry {
    address: String,
    operation: String,
    #[serde(default)]
    params: serde_json::Value,
}

/// Reads a boot file into executable operation requests.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON array of
/// operations, or contains an unparseable address.
pub fn load_boot_file(path: &Path) -> anyhow::Result<Vec<OperationRequest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading boot file {}", path.display()))?;
    let entries: Vec<BootEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing boot file {}", path.display()))?;

    let mut requests = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let address: PathAddress = entry
            .address
            .parse()
            .with_context(|| format!("boot entry {index}: bad address `{}`", entry.address))?;
        requests.push(OperationRequest::new(
            address,
            entry.operation,
            ModelValue::from_json(&entry.params),
        ));
    }
    Ok(requests)
}

/// Applies boot operations in order, stopping at the first failure.
///
/// # Errors
///
/// Returns an error naming the failed operation and its failure detail.
pub fn apply_boot(
    controller: &ManagementController,
    requests: &[OperationRequest],
) -> anyhow::Result<()> {
    for request in requests {
        let outcome = controller.execute(request);
        if !outcome.is_success() {
            bail!(
                "boot operation `{}` at {} failed: {}",
                request.operation,
                request.address,
                outcome.body
            );
        }
    }
    if !requests.is_empty() {
        info!(operations = requests.len(), "boot file applied");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::handlers::register_builtin;
    use crate::lifecycle::ServerLifecycle;

    fn boot_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn booting_controller() -> ManagementController {
        let controller = ManagementController::new(Arc::new(ServerLifecycle::new()));
        register_builtin(&controller);
        controller
    }

    #[test]
    fn load_parses_entries_in_order() {
        let file = boot_file(
            r#"[
                { "address": "/", "operation": "add-host",
                  "params": { "name": "primary" } },
                { "address": "/server=web", "operation": "add",
                  "params": { "port": 8080 } },
                { "address": "/server=web", "operation": "read-resource" }
            ]"#,
        );

        let requests = load_boot_file(file.path()).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].operation, "add-host");
        assert_eq!(requests[1].address, "/server=web".parse().unwrap());

        // JSON integers come through as the integer kind.
        let mut expected = ModelValue::object();
        expected.set("port", 8080_i64).unwrap();
        assert_eq!(requests[1].params, expected);

        // Omitted params read as undefined.
        assert_eq!(requests[2].params, ModelValue::Undefined);
    }

    #[test]
    fn load_rejects_bad_addresses() {
        let file = boot_file(r#"[ { "address": "server=web", "operation": "add" } ]"#);

        let error = load_boot_file(file.path()).unwrap_err();
        assert!(error.to_string().contains("bad address `server=web`"));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let file = boot_file("not json at all");

        let error = load_boot_file(file.path()).unwrap_err();
        assert!(error.to_string().contains("parsing boot file"));
    }

    #[test]
    fn apply_runs_operations_against_the_controller() {
        let file = boot_file(
            r#"[
                { "address": "/", "operation": "add-host",
                  "params": { "name": "primary" } },
                { "address": "/server=web", "operation": "add",
                  "params": { "port": 8080 } }
            ]"#,
        );
        let requests = load_boot_file(file.path()).unwrap();
        let controller = booting_controller();

        apply_boot(&controller, &requests).unwrap();

        assert_eq!(controller.host_info().unwrap().name, "primary");
        let model = controller
            .tree()
            .lookup(&"/server=web".parse().unwrap())
            .unwrap();
        assert_eq!(model.get("port").and_then(ModelValue::as_i64), Some(8080));
    }

    #[test]
    fn apply_stops_at_the_first_failure() {
        let file = boot_file(
            r#"[
                { "address": "/", "operation": "no-such-operation" },
                { "address": "/server=web", "operation": "add" }
            ]"#,
        );
        let requests = load_boot_file(file.path()).unwrap();
        let controller = booting_controller();

        let error = apply_boot(&controller, &requests).unwrap_err();
        assert!(error.to_string().contains("no-such-operation"));

        // The entry after the failure never ran.
        let missing = controller.tree().lookup(&"/server=web".parse().unwrap());
        assert!(missing.is_err());
    }
}
