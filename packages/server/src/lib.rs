//! Bosun Server — the management controller and its TCP endpoint.
//!
//! Layers, bottom up: the committed resource tree with single-writer
//! subtree scopes, the staged operation pipeline that executes handlers
//! against a transactional working copy, the built-in operation handlers,
//! and the framed TCP endpoint that carries requests from management
//! clients into the controller.

pub mod boot;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod network;
pub mod pipeline;
pub mod tree;

pub use config::ServerConfig;
pub use lifecycle::{Phase, ServerLifecycle};
pub use network::{ClientError, ManagementClient, ManagementServer};
pub use pipeline::{ManagementController, OperationOutcome, OperationRequest};
pub use tree::ResourceTree;
