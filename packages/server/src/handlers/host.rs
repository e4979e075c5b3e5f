//! Boot-time host registration.

use std::sync::Arc;
use std::time::Instant;

use bosun_core::{ModelValue, PathAddress, PathElement};
use parking_lot::RwLock;

use crate::pipeline::{HostInfo, OperationContext, OperationError, StepHandler};

use super::require_str;

/// Operation name for registering the local host.
pub const ADD_HOST: &str = "add-host";

/// Resource type holding the management subsystem's own children.
const MANAGEMENT: &str = "management";

/// Children created under `management` at registration.
const MANAGEMENT_CHILDREN: [&str; 2] = ["security-realms", "connections"];

/// Names the root resource after the local host, creates the standard
/// management children, and records the host identity for the rest of the
/// process lifetime.
///
/// Only valid while the server is booting: the host name comes from
/// configuration that is read exactly once, so there is nothing a rename
/// could apply to later.
pub struct AddHostHandler {
    host_info: Arc<RwLock<Option<HostInfo>>>,
}

impl AddHostHandler {
    #[must_use]
    pub fn new(host_info: Arc<RwLock<Option<HostInfo>>>) -> Self {
        Self { host_info }
    }
}

impl StepHandler for AddHostHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        if !context.booting() {
            return Err(OperationError::IllegalState(
                "add-host is only valid while the server is booting".to_string(),
            ));
        }
        let name = require_str(operation, "name")?.to_string();

        context
            .read_model_for_update(&PathAddress::root())?
            .set("name", name.clone())?;
        for child in MANAGEMENT_CHILDREN {
            let address = PathAddress::from(PathElement::new(MANAGEMENT, child));
            context.create_resource(&address, ModelValue::Undefined)?;
        }

        // Written after every fallible step -- the slot is not covered by
        // rollback.
        *self.host_info.write() = Some(HostInfo {
            name: name.clone(),
            registered_at: Instant::now(),
        });
        tracing::info!(host = %name, "registered local host");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
