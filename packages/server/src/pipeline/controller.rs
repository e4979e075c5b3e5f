//! The management controller: the single entry point for operations.

use std::sync::Arc;
use std::time::Instant;

use bosun_core::{ModelValue, Outcome, PathAddress};
use parking_lot::RwLock;

use crate::lifecycle::ServerLifecycle;
use crate::tree::ResourceTree;

use super::context::OperationContext;
use super::error::OperationError;
use super::registry::HandlerRegistry;
use super::step::Stage;

/// Identity of the host this process manages, recorded during boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// The host's unique name within the domain.
    pub name: String,
    /// When the registration committed.
    pub registered_at: Instant,
}

/// One operation to execute: target address, operation name, parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Target node in the configuration tree.
    pub address: PathAddress,
    /// Registered operation name.
    pub operation: String,
    /// Operation parameters.
    pub params: ModelValue,
}

impl OperationRequest {
    pub fn new(address: PathAddress, operation: impl Into<String>, params: ModelValue) -> Self {
        Self {
            address,
            operation: operation.into(),
            params,
        }
    }
}

/// Terminal report of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Success or failure, exactly as it travels on the wire.
    pub outcome: Outcome,
    /// Result on success, failure detail on failure.
    pub body: ModelValue,
}

impl OperationOutcome {
    fn committed(result: ModelValue) -> Self {
        Self {
            outcome: Outcome::Success,
            body: result,
        }
    }

    fn rolled_back(error: &OperationError) -> Self {
        Self {
            outcome: Outcome::Failed,
            body: error.to_detail(),
        }
    }

    /// Whether the invocation committed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Routes each operation through handler resolution, a scoped transaction,
/// and the staged step pipeline, and reports the terminal outcome.
#[derive(Debug)]
pub struct ManagementController {
    tree: ResourceTree,
    registry: HandlerRegistry,
    lifecycle: Arc<ServerLifecycle>,
    host_info: Arc<RwLock<Option<HostInfo>>>,
}

impl ManagementController {
    #[must_use]
    pub fn new(lifecycle: Arc<ServerLifecycle>) -> Self {
        Self {
            tree: ResourceTree::new(),
            registry: HandlerRegistry::new(),
            lifecycle,
            host_info: Arc::new(RwLock::new(None)),
        }
    }

    /// The managed resource tree.
    #[must_use]
    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    /// The operation handler registry.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// The lifecycle this controller gates boot-only operations on.
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<ServerLifecycle> {
        &self.lifecycle
    }

    /// Whether the boot window is still open.
    #[must_use]
    pub fn is_booting(&self) -> bool {
        self.lifecycle.is_booting()
    }

    /// Closes the boot window. Boot-only operations fail from here on.
    pub fn finish_boot(&self) {
        self.lifecycle.finish_boot();
    }

    /// Shared slot the boot-time host registration writes into.
    #[must_use]
    pub fn host_info_slot(&self) -> Arc<RwLock<Option<HostInfo>>> {
        Arc::clone(&self.host_info)
    }

    /// The registered host identity, once boot has recorded one.
    #[must_use]
    pub fn host_info(&self) -> Option<HostInfo> {
        self.host_info.read().clone()
    }

    /// Executes one operation to completion.
    ///
    /// Handler resolution, write-scope acquisition, staged execution, and
    /// commit or rollback all happen inside; the caller only sees the
    /// terminal outcome. Blocks while an overlapping operation holds the
    /// write scope, so call it off the async runtime's core threads.
    pub fn execute(&self, request: &OperationRequest) -> OperationOutcome {
        let span = tracing::info_span!(
            "operation",
            operation = %request.operation,
            address = %request.address,
            outcome = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        let _guard = span.enter();
        let started = Instant::now();

        let outcome = match self.execute_inner(request) {
            Ok(result) => OperationOutcome::committed(result),
            Err(error) => {
                tracing::debug!(error = %error, "operation rolled back");
                OperationOutcome::rolled_back(&error)
            }
        };

        span.record(
            "outcome",
            if outcome.is_success() {
                "committed"
            } else {
                "rolled-back"
            },
        );
        span.record(
            "duration_ms",
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        tracing::info!("operation complete");
        outcome
    }

    fn execute_inner(&self, request: &OperationRequest) -> Result<ModelValue, OperationError> {
        let Some(handler) = self.registry.get(&request.operation) else {
            return Err(OperationError::UnknownOperation {
                name: request.operation.clone(),
                address: request.address.clone(),
            });
        };

        // A wildcard target cannot anchor a write scope; such operations
        // start read-only and any staged write fails the invocation.
        let scope_root = if request.address.is_multi_target() {
            None
        } else {
            Some(request.address.clone())
        };
        let txn = self.tree.begin(scope_root);

        let mut context = OperationContext::new(txn, &self.registry, self.is_booting());
        context.add_step(
            Stage::Model,
            request.address.clone(),
            request.params.clone(),
            handler,
        )?;
        context.run()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bosun_core::PathElement;

    use super::super::step::StepHandler;
    use super::*;

    fn controller() -> ManagementController {
        ManagementController::new(Arc::new(ServerLifecycle::new()))
    }

    fn request(address: &str, operation: &str) -> OperationRequest {
        OperationRequest::new(
            address.parse().unwrap(),
            operation,
            ModelValue::Undefined,
        )
    }

    #[test]
    fn unknown_operations_roll_back_with_a_detail() {
        let controller = controller();
        let outcome = controller.execute(&request("/host=a", "explode"));
        assert!(!outcome.is_success());
        let detail = outcome.body.as_str().unwrap_or_default().to_string();
        assert!(detail.contains("explode"), "unexpected detail: {detail}");
    }

    #[test]
    fn a_registered_handler_runs_and_reports_its_result() {
        let controller = controller();
        let echo: Arc<dyn StepHandler> =
            Arc::new(|context: &mut OperationContext<'_>, operation: &ModelValue| {
                context.set_result(operation.clone());
                Ok(())
            });
        controller.registry().register("echo", echo);

        let mut params = ModelValue::object();
        params.set("payload", 7_i64).unwrap();
        let outcome = controller.execute(&OperationRequest::new(
            PathAddress::root(),
            "echo",
            params.clone(),
        ));
        assert!(outcome.is_success());
        assert_eq!(outcome.body, params);
    }

    #[test]
    fn failures_leave_no_trace_in_the_tree() {
        let controller = controller();
        let half_write: Arc<dyn StepHandler> =
            Arc::new(|context: &mut OperationContext<'_>, _: &ModelValue| {
                let address = PathAddress::from(PathElement::new("host", "a"));
                context.create_resource(&address, ModelValue::object())?;
                Err(OperationError::Failed(ModelValue::from("late failure")))
            });
        controller.registry().register("half-write", half_write);

        let outcome = controller.execute(&request("/", "half-write"));
        assert!(!outcome.is_success());
        assert_eq!(outcome.body, ModelValue::from("late failure"));
        assert!(controller
            .tree()
            .lookup(&"/host=a".parse().unwrap())
            .is_err());
    }

    #[test]
    fn the_boot_flag_is_sampled_when_the_invocation_begins() {
        let controller = controller();
        let observe: Arc<dyn StepHandler> =
            Arc::new(|context: &mut OperationContext<'_>, _: &ModelValue| {
                context.set_result(context.booting());
                Ok(())
            });
        controller.registry().register("observe-boot", observe);

        let during_boot = controller.execute(&request("/", "observe-boot"));
        assert_eq!(during_boot.body, ModelValue::from(true));

        controller.finish_boot();
        let after_boot = controller.execute(&request("/", "observe-boot"));
        assert_eq!(after_boot.body, ModelValue::from(false));
    }

    #[test]
    fn wildcard_requests_run_without_a_write_scope() {
        let controller = controller();
        let touch: Arc<dyn StepHandler> =
            Arc::new(|context: &mut OperationContext<'_>, _: &ModelValue| {
                let address = context.current_address().clone();
                let matches = context.query(&address).len();
                context.set_result(i64::try_from(matches).unwrap_or(i64::MAX));
                Ok(())
            });
        controller.registry().register("count-matches", touch);

        let outcome = controller.execute(&request("/host=*", "count-matches"));
        assert!(outcome.is_success());
        assert_eq!(outcome.body, ModelValue::from(0_i64));
    }

    #[test]
    fn host_info_starts_empty_and_round_trips_through_the_slot() {
        let controller = controller();
        assert!(controller.host_info().is_none());
        *controller.host_info_slot().write() = Some(HostInfo {
            name: "primary".to_string(),
            registered_at: Instant::now(),
        });
        assert_eq!(
            controller.host_info().map(|info| info.name),
            Some("primary".to_string())
        );
    }
}
