//! The step contract.

use std::fmt;

use bosun_core::ModelValue;

use super::context::OperationContext;
use super::error::OperationError;

/// Execution stages of an invocation, in running order.
///
/// Steps run stage by stage; within one stage they run in queueing order.
/// A running step may queue further steps for its own stage or a later one,
/// never an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Mutation of the persistent configuration model.
    Model,
    /// Propagation of the model change into runtime services.
    Runtime,
    /// Cross-cutting validation of the final staged state.
    Verify,
    /// Completion bookkeeping. Nothing can be queued after it.
    Done,
}

impl Stage {
    /// Every stage in running order.
    pub const ALL: [Stage; 4] = [Stage::Model, Stage::Runtime, Stage::Verify, Stage::Done];

    /// Position in the running order.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Model => 0,
            Self::Runtime => 1,
            Self::Verify => 2,
            Self::Done => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Model => "model",
            Self::Runtime => "runtime",
            Self::Verify => "verify",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One unit of operation logic.
///
/// A handler expresses every effect through the context: reading and
/// staging tree changes, queueing further steps, and recording the result.
/// Any `Fn` of the right shape is a handler, so compound operations are
/// ordinary closures queueing closures.
pub trait StepHandler: Send + Sync {
    /// Runs this step against the invocation's working state.
    ///
    /// # Errors
    /// Any returned error rolls back the whole invocation.
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError>;

    /// Descriptive metadata served by the introspection operations. The
    /// execution path never reads it.
    fn description(&self) -> ModelValue {
        ModelValue::Undefined
    }
}

impl<F> StepHandler for F
where
    F: Fn(&mut OperationContext<'_>, &ModelValue) -> Result<(), OperationError> + Send + Sync,
{
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &ModelValue,
    ) -> Result<(), OperationError> {
        self(context, operation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
