//! The per-invocation execution context.

use std::collections::VecDeque;
use std::sync::Arc;

use bosun_core::{ModelValue, PathAddress};

use crate::tree::{Resource, Transaction, TreeError};

use super::error::OperationError;
use super::registry::HandlerRegistry;
use super::step::{Stage, StepHandler};

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Created, no step has run yet.
    Pending,
    /// Steps are executing.
    Running,
    /// Every step succeeded and the staged changes are durable.
    Committed,
    /// A step failed and every staged change was discarded.
    RolledBack,
}

struct PendingStep {
    handler: Arc<dyn StepHandler>,
    operation: ModelValue,
    address: PathAddress,
}

/// The context threaded through every step of one invocation.
///
/// It owns the transaction, the stage-tagged work queue, and the result
/// slot. Handlers read and stage tree state through it and queue further
/// steps with [`OperationContext::add_step`].
pub struct OperationContext<'c> {
    txn: Transaction<'c>,
    registry: &'c HandlerRegistry,
    booting: bool,
    state: ExecutionState,
    current_stage: Stage,
    current_address: PathAddress,
    queues: [VecDeque<PendingStep>; 4],
    result: ModelValue,
}

impl<'c> OperationContext<'c> {
    pub(crate) fn new(
        txn: Transaction<'c>,
        registry: &'c HandlerRegistry,
        booting: bool,
    ) -> Self {
        Self {
            txn,
            registry,
            booting,
            state: ExecutionState::Pending,
            current_stage: Stage::Model,
            current_address: PathAddress::root(),
            queues: std::array::from_fn(|_| VecDeque::new()),
            result: ModelValue::Undefined,
        }
    }

    /// Whether the server was still booting when this invocation began.
    #[must_use]
    pub fn booting(&self) -> bool {
        self.booting
    }

    /// The invocation's lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Stage of the step currently running.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    /// Target address of the step currently running.
    #[must_use]
    pub fn current_address(&self) -> &PathAddress {
        &self.current_address
    }

    /// The handler registry, for the introspection operations.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        self.registry
    }

    /// Records the invocation's result value, replacing any earlier one.
    pub fn set_result(&mut self, result: impl Into<ModelValue>) {
        self.result = result.into();
    }

    /// Queues `handler` to run in `stage` against `address`.
    ///
    /// # Errors
    /// [`OperationError::IllegalState`] when `stage` already lies behind
    /// the stage currently running.
    pub fn add_step(
        &mut self,
        stage: Stage,
        address: PathAddress,
        operation: ModelValue,
        handler: Arc<dyn StepHandler>,
    ) -> Result<(), OperationError> {
        if stage < self.current_stage {
            return Err(OperationError::IllegalState(format!(
                "cannot queue a step for the {stage} stage while running {current}",
                current = self.current_stage
            )));
        }
        self.queues[stage.index()].push_back(PendingStep {
            handler,
            operation,
            address,
        });
        Ok(())
    }

    // -- Tree access ---------------------------------------------------------

    /// The attribute model at `address` in the invocation's working state.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve.
    pub fn read_model(&self, address: &PathAddress) -> Result<&ModelValue, TreeError> {
        self.txn.read_model(address)
    }

    /// The resource at `address` in the invocation's working state.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve.
    pub fn resource(&self, address: &PathAddress) -> Result<&Resource, TreeError> {
        self.txn.resource(address)
    }

    /// Resolves a possibly-wildcard `address` against the working state.
    #[must_use]
    pub fn query(&self, address: &PathAddress) -> Vec<(PathAddress, &Resource)> {
        self.txn.query(address)
    }

    /// The attribute model at `address`, writable.
    ///
    /// # Errors
    /// See [`Transaction::read_model_for_update`].
    pub fn read_model_for_update(
        &mut self,
        address: &PathAddress,
    ) -> Result<&mut ModelValue, TreeError> {
        self.txn.read_model_for_update(address)
    }

    /// Stages a new resource at `address`.
    ///
    /// # Errors
    /// See [`Transaction::create_resource`].
    pub fn create_resource(
        &mut self,
        address: &PathAddress,
        model: ModelValue,
    ) -> Result<(), TreeError> {
        self.txn.create_resource(address, model)
    }

    /// Stages removal of the resource at `address`.
    ///
    /// # Errors
    /// See [`Transaction::remove_resource`].
    pub fn remove_resource(
        &mut self,
        address: &PathAddress,
        recursive: bool,
    ) -> Result<(), TreeError> {
        self.txn.remove_resource(address, recursive)
    }

    // -- Execution -----------------------------------------------------------

    /// Runs queued steps to exhaustion, then commits. The first failing
    /// step rolls the whole invocation back instead.
    ///
    /// Steps queued while running join the schedule: same-stage steps after
    /// the ones already queued, later-stage steps once their stage begins.
    pub(crate) fn run(mut self) -> Result<ModelValue, OperationError> {
        self.state = ExecutionState::Running;
        while let Some((stage, step)) = self.next_step() {
            self.current_stage = stage;
            self.current_address = step.address.clone();
            tracing::trace!(stage = %stage, address = %step.address, "running step");
            if let Err(error) = step.handler.execute(&mut self, &step.operation) {
                self.state = ExecutionState::RolledBack;
                self.txn.rollback();
                return Err(error);
            }
        }
        self.state = ExecutionState::Committed;
        self.txn.commit();
        Ok(self.result)
    }

    fn next_step(&mut self) -> Option<(Stage, PendingStep)> {
        for stage in Stage::ALL.into_iter().skip(self.current_stage.index()) {
            if let Some(step) = self.queues[stage.index()].pop_front() {
                return Some((stage, step));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use crate::tree::ResourceTree;

    use super::*;

    fn handler<F>(f: F) -> Arc<dyn StepHandler>
    where
        F: Fn(&mut OperationContext<'_>, &ModelValue) -> Result<(), OperationError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(f)
    }

    fn run_with_first_step(
        tree: &ResourceTree,
        registry: &HandlerRegistry,
        first: Arc<dyn StepHandler>,
    ) -> Result<ModelValue, OperationError> {
        let txn = tree.begin(Some(PathAddress::root()));
        let mut context = OperationContext::new(txn, registry, false);
        context
            .add_step(
                Stage::Model,
                PathAddress::root(),
                ModelValue::Undefined,
                first,
            )
            .unwrap();
        context.run()
    }

    #[test]
    fn steps_run_in_stage_order_then_fifo() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let trace = Arc::clone(&trace);
            handler(move |context, _| {
                trace.lock().push("first");
                let verify = {
                    let trace = Arc::clone(&trace);
                    handler(move |_, _| {
                        trace.lock().push("verify");
                        Ok(())
                    })
                };
                let runtime = {
                    let trace = Arc::clone(&trace);
                    handler(move |_, _| {
                        trace.lock().push("runtime");
                        Ok(())
                    })
                };
                let second = {
                    let trace = Arc::clone(&trace);
                    handler(move |_, _| {
                        trace.lock().push("second");
                        Ok(())
                    })
                };
                // Queue out of stage order; the schedule reorders by stage.
                context.add_step(
                    Stage::Verify,
                    PathAddress::root(),
                    ModelValue::Undefined,
                    verify,
                )?;
                context.add_step(
                    Stage::Runtime,
                    PathAddress::root(),
                    ModelValue::Undefined,
                    runtime,
                )?;
                context.add_step(
                    Stage::Model,
                    PathAddress::root(),
                    ModelValue::Undefined,
                    second,
                )?;
                Ok(())
            })
        };

        run_with_first_step(&tree, &registry, first).unwrap();
        assert_eq!(*trace.lock(), vec!["first", "second", "runtime", "verify"]);
    }

    #[test]
    fn queueing_an_earlier_stage_is_rejected() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();

        let runtime_step = handler(|context, _| {
            let late = handler(|_, _| Ok(()));
            let err = context
                .add_step(Stage::Model, PathAddress::root(), ModelValue::Undefined, late)
                .unwrap_err();
            assert!(matches!(err, OperationError::IllegalState(_)));
            Ok(())
        });
        let first = handler(move |context, _| {
            context.add_step(
                Stage::Runtime,
                PathAddress::root(),
                ModelValue::Undefined,
                Arc::clone(&runtime_step),
            )
        });

        run_with_first_step(&tree, &registry, first).unwrap();
    }

    #[test]
    fn same_stage_additions_run_after_existing_queue_entries() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let txn = tree.begin(Some(PathAddress::root()));
        let mut context = OperationContext::new(txn, &registry, false);

        let a = {
            let trace = Arc::clone(&trace);
            handler(move |context: &mut OperationContext<'_>, _: &ModelValue| {
                trace.lock().push("a");
                let appended = {
                    let trace = Arc::clone(&trace);
                    handler(move |_, _| {
                        trace.lock().push("a-appended");
                        Ok(())
                    })
                };
                context.add_step(
                    Stage::Model,
                    PathAddress::root(),
                    ModelValue::Undefined,
                    appended,
                )
            })
        };
        let b = {
            let trace = Arc::clone(&trace);
            handler(move |_: &mut OperationContext<'_>, _: &ModelValue| {
                trace.lock().push("b");
                Ok(())
            })
        };

        context
            .add_step(Stage::Model, PathAddress::root(), ModelValue::Undefined, a)
            .unwrap();
        context
            .add_step(Stage::Model, PathAddress::root(), ModelValue::Undefined, b)
            .unwrap();
        context.run().unwrap();

        assert_eq!(*trace.lock(), vec!["a", "b", "a-appended"]);
    }

    #[test]
    fn a_failing_step_rolls_back_every_staged_change() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();

        let first = handler(|context, _| {
            context.create_resource(
                &"/host=a".parse().unwrap(),
                ModelValue::object(),
            )?;
            let failing = handler(|_, _| {
                Err(OperationError::Failed(ModelValue::from("runtime exploded")))
            });
            context.add_step(
                Stage::Runtime,
                PathAddress::root(),
                ModelValue::Undefined,
                failing,
            )
        });

        let err = run_with_first_step(&tree, &registry, first).unwrap_err();
        assert_eq!(
            err,
            OperationError::Failed(ModelValue::from("runtime exploded"))
        );
        // The model-stage creation must not have survived.
        assert!(tree.lookup(&"/host=a".parse().unwrap()).is_err());
    }

    #[test]
    fn successful_runs_commit_and_return_the_result() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();

        let first = handler(|context, _| {
            context.create_resource(&"/host=a".parse().unwrap(), ModelValue::object())?;
            context.set_result("created");
            Ok(())
        });

        let result = run_with_first_step(&tree, &registry, first).unwrap();
        assert_eq!(result, ModelValue::from("created"));
        assert!(tree.lookup(&"/host=a".parse().unwrap()).is_ok());
    }

    #[test]
    fn handlers_observe_the_running_state_and_step_address() {
        let tree = ResourceTree::new();
        let registry = HandlerRegistry::new();

        let txn = tree.begin(Some(PathAddress::root()));
        let mut context = OperationContext::new(txn, &registry, true);
        assert_eq!(context.state(), ExecutionState::Pending);

        let observer = handler(|context: &mut OperationContext<'_>, _: &ModelValue| {
            assert_eq!(context.state(), ExecutionState::Running);
            assert_eq!(context.current_stage(), Stage::Model);
            assert_eq!(context.current_address().to_string(), "/host=a");
            assert!(context.booting());
            Ok(())
        });
        context
            .add_step(
                Stage::Model,
                "/host=a".parse().unwrap(),
                ModelValue::Undefined,
                observer,
            )
            .unwrap();
        context.run().unwrap();
    }
}
