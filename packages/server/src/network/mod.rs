//! Framed transport, connection management, and the management endpoint.

pub mod client;
pub mod codec;
pub mod connection;
pub mod server;

pub use client::*;
pub use codec::*;
pub use connection::*;
pub use server::ManagementServer;
