//! Management endpoint with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` accepts connections.
//! This separation lets boot operations run against the controller before
//! the endpoint is reachable.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bosun_core::wire::{encode_value, negotiate, PROTOCOL_VERSION};
use bosun_core::{Frame, ModelValue, RequestMessage, ResponseMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::codec::ManagementCodec;
use super::connection::{ConnectionHandle, ConnectionRegistry};
use crate::config::{ConnectionConfig, ServerConfig};
use crate::lifecycle::ServerLifecycle;
use crate::pipeline::{ManagementController, OperationRequest};

/// Manages the full management-endpoint lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (connection registry)
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until the lifecycle signals shutdown
///
/// The registry is shared via `Arc` so the binary and tests can inspect
/// active connections after construction.
pub struct ManagementServer {
    config: ServerConfig,
    controller: Arc<ManagementController>,
    lifecycle: Arc<ServerLifecycle>,
    registry: Arc<ConnectionRegistry>,
    listener: Option<TcpListener>,
}

impl ManagementServer {
    /// Creates a new endpoint without binding any port.
    #[must_use]
    pub fn new(config: ServerConfig, controller: Arc<ManagementController>) -> Self {
        let lifecycle = Arc::clone(controller.lifecycle());
        Self {
            config,
            controller,
            lifecycle,
            registry: Arc::new(ConnectionRegistry::new()),
            listener: None,
        }
    }

    /// Returns a shared reference to the connection registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Binds the TCP listener to the configured address.
    ///
    /// Returns the actual bound address, which may differ from the
    /// configured one when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let addr = listener.local_addr()?;

        info!(%addr, "management endpoint bound");

        self.listener = Some(listener);
        Ok(addr)
    }

    /// Accepts connections until the lifecycle signals shutdown.
    ///
    /// Consumes `self` because the listener is moved into the accept loop.
    ///
    /// After the shutdown signal:
    /// 1. Every active connection is sent a goodbye frame
    /// 2. Waits up to the configured drain timeout for in-flight operations
    /// 3. The lifecycle transitions to Stopped once drained
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop hits a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let registry = self.registry;
        let lifecycle = self.lifecycle;
        let controller = self.controller;
        let config = self.config;

        let mut shutdown = lifecycle.shutdown_receiver();

        info!("serving management connections");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(error) => {
                            warn!(%error, "accept failed");
                            continue;
                        }
                    };
                    if registry.count() >= config.connection.max_connections {
                        warn!(%peer, limit = config.connection.max_connections,
                            "connection limit reached, refusing");
                        drop(stream);
                        continue;
                    }
                    let (handle, outbound) = registry.register(peer, &config.connection);
                    debug!(conn = handle.id.0, %peer, "connection accepted");
                    tokio::spawn(handle_connection(
                        stream,
                        handle,
                        outbound,
                        Arc::clone(&registry),
                        Arc::clone(&controller),
                        Arc::clone(&lifecycle),
                        config.connection.clone(),
                    ));
                }
                _ = shutdown.changed() => break,
            }
        }

        drain_connections(&registry, &lifecycle, config.drain_timeout()).await;
        Ok(())
    }
}

/// Runs one connection to completion.
///
/// The write loop lives in its own task, fed by the bounded outbound
/// channel; this function runs the read loop. The writer exits once every
/// sender is gone, which happens after the read loop returns and all
/// in-flight operations for this connection have answered.
async fn handle_connection(
    stream: TcpStream,
    handle: Arc<ConnectionHandle>,
    mut outbound: mpsc::Receiver<Frame>,
    registry: Arc<ConnectionRegistry>,
    controller: Arc<ManagementController>,
    lifecycle: Arc<ServerLifecycle>,
    config: ConnectionConfig,
) {
    let framed = Framed::new(stream, ManagementCodec::new(config.max_frame_bytes));
    let (mut sink, mut source) = framed.split();

    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let disconnect = matches!(frame, Frame::Goodbye);
            if sink.send(frame).await.is_err() {
                break;
            }
            if disconnect {
                break;
            }
        }
        // Flushes buffered frames and shuts the socket down.
        let _ = sink.close().await;
    });

    while let Some(next) = source.next().await {
        match next {
            Ok(Frame::Request(request)) => {
                dispatch_request(request, &handle, &controller, &lifecycle, &config);
            }
            Ok(Frame::Response(response)) => {
                warn!(
                    conn = handle.id.0,
                    correlation_id = response.correlation_id,
                    "ignoring unsolicited response frame"
                );
            }
            Ok(Frame::Goodbye) => {
                debug!(conn = handle.id.0, "peer said goodbye");
                break;
            }
            Err(error) => {
                warn!(conn = handle.id.0, %error, "closing connection on protocol error");
                break;
            }
        }
    }

    registry.remove(handle.id);
    debug!(conn = handle.id.0, "connection closed");
}

/// Hands one request to the controller and queues the response.
///
/// Each request runs in its own task so a slow operation cannot block the
/// connection's read loop; correlation ids let the client match reordered
/// responses. The in-flight guard is taken here, before the task is
/// spawned, so a drain starting immediately after sees the operation.
fn dispatch_request(
    request: RequestMessage,
    handle: &Arc<ConnectionHandle>,
    controller: &Arc<ManagementController>,
    lifecycle: &Arc<ServerLifecycle>,
    config: &ConnectionConfig,
) {
    let guard = lifecycle.track();
    let handle = Arc::clone(handle);
    let controller = Arc::clone(controller);
    let send_timeout = config.send_timeout();

    tokio::spawn(async move {
        let _guard = guard;
        let version = negotiate(PROTOCOL_VERSION, request.version);
        let correlation_id = request.correlation_id;
        let operation = OperationRequest::new(request.address, request.operation, request.params);

        // The controller blocks while acquiring its write scope, so it
        // must not run on the async workers.
        let executed = {
            let controller = Arc::clone(&controller);
            tokio::task::spawn_blocking(move || controller.execute(&operation)).await
        };

        let mut response = match executed {
            Ok(outcome) if outcome.is_success() => {
                ResponseMessage::success(correlation_id, outcome.body)
            }
            Ok(outcome) => ResponseMessage::failure(correlation_id, outcome.body),
            Err(error) => {
                warn!(%error, "operation task failed");
                ResponseMessage::failure(
                    correlation_id,
                    ModelValue::from("internal error: operation task failed"),
                )
            }
        };
        response.version = version;

        if let Err(error) = handle
            .send_timeout(deliverable(response), send_timeout)
            .await
        {
            debug!(
                conn = handle.id.0,
                ?error,
                "dropping response for closed or stalled connection"
            );
        }
    });
}

/// Wraps a response for the writer, downgrading it to a failure when its
/// body cannot be encoded.
///
/// A recursive read of a deep enough tree renders a body past the payload
/// ceilings. The writer closes the stream on an encode failure, so an
/// unencodable body is swapped here for a failure naming the limit; the
/// outcome still reaches the caller and the connection stays up.
fn deliverable(response: ResponseMessage) -> Frame {
    let mut scratch = Vec::new();
    match encode_value(&response.body, &mut scratch) {
        Ok(()) => Frame::Response(response),
        Err(error) => {
            warn!(
                correlation_id = response.correlation_id,
                %error,
                "response body exceeds the wire limits, sending a failure instead"
            );
            let mut downgraded = ResponseMessage::failure(
                response.correlation_id,
                ModelValue::from(format!("result exceeds the wire limits: {error}")),
            );
            downgraded.version = response.version;
            Frame::Response(downgraded)
        }
    }
}

/// Disconnects all clients and waits for in-flight operations to finish.
async fn drain_connections(
    registry: &ConnectionRegistry,
    lifecycle: &ServerLifecycle,
    timeout: Duration,
) {
    lifecycle.begin_shutdown();

    let handles = registry.drain_all();
    if !handles.is_empty() {
        info!(connections = handles.len(), "disconnecting management clients");
        for handle in &handles {
            // Ignore full channels -- the write loop is about to close anyway.
            let _ = handle.try_send(Frame::Goodbye);
        }
    }

    if lifecycle.wait_for_drain(timeout).await {
        info!("all in-flight operations drained");
    } else {
        warn!("drain timeout expired with operations still in flight");
    }
}
