//! The staged operation pipeline.
//!
//! An invocation is a transaction plus a stage-tagged queue of steps. The
//! [`ManagementController`] resolves the handler, opens the transaction,
//! runs the queue stage by stage, and commits or rolls back as one unit.

pub mod context;
pub mod controller;
pub mod error;
pub mod registry;
pub mod step;

pub use context::{ExecutionState, OperationContext};
pub use controller::{
    HostInfo, ManagementController, OperationOutcome, OperationRequest,
};
pub use error::OperationError;
pub use registry::HandlerRegistry;
pub use step::{Stage, StepHandler};
