//! Async client for the management protocol.
//!
//! Used by integration tests and tooling. Requests may be issued
//! concurrently from multiple tasks; responses are matched back to their
//! callers by correlation id, so a slow operation never blocks an
//! unrelated one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use bosun_core::{Frame, ModelValue, PathAddress, RequestMessage, ResponseMessage};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use super::codec::ManagementCodec;
use crate::pipeline::OperationOutcome;

/// Error surfaced to a management client caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server closed the connection (goodbye, EOF, or transport error).
    #[error("server closed the connection")]
    Closed,
    /// The connection could not be established.
    #[error("connecting to the management endpoint: {0}")]
    Connect(#[from] std::io::Error),
}

enum Command {
    Execute(RequestMessage, oneshot::Sender<ResponseMessage>),
    Goodbye,
}

/// Handle to one management connection.
///
/// All socket traffic runs on a background task owned by this handle.
/// Dropping the client says goodbye and tears the connection down.
#[derive(Debug)]
pub struct ManagementClient {
    commands: mpsc::Sender<Command>,
    next_correlation: AtomicU32,
}

impl ManagementClient {
    /// Connects to a management endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] when the TCP connection fails.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let framed = Framed::new(stream, ManagementCodec::default());
        let (commands, command_rx) = mpsc::channel(32);
        tokio::spawn(connection_task(framed, command_rx));
        Ok(Self {
            commands,
            next_correlation: AtomicU32::new(1),
        })
    }

    /// Executes one operation and waits for its response.
    ///
    /// The outcome mirrors what the server reports: a failed operation is
    /// an `Ok` outcome carrying the failure detail, not a [`ClientError`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] when the server disconnects before
    /// answering.
    pub async fn execute(
        &self,
        address: PathAddress,
        operation: impl Into<String>,
        params: ModelValue,
    ) -> Result<OperationOutcome, ClientError> {
        let correlation_id = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        let request = RequestMessage::new(correlation_id, operation, address, params);

        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Execute(request, tx))
            .await
            .map_err(|_| ClientError::Closed)?;

        let response = rx.await.map_err(|_| ClientError::Closed)?;
        Ok(OperationOutcome {
            outcome: response.outcome,
            body: response.body,
        })
    }

    /// Announces a graceful disconnect and consumes the client.
    pub async fn goodbye(self) {
        // Ignore send errors -- the connection task may already be gone.
        let _ = self.commands.send(Command::Goodbye).await;
    }
}

/// Owns the socket: writes commands out, routes responses back.
///
/// Keeping all connection state in one task means there is no window
/// where a caller can register a pending request that nobody will ever
/// answer: when this task ends, for any reason, dropping the pending map
/// fails every waiter.
async fn connection_task(
    mut framed: Framed<TcpStream, ManagementCodec>,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut pending: HashMap<u32, oneshot::Sender<ResponseMessage>> = HashMap::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Execute(request, tx)) => {
                    pending.insert(request.correlation_id, tx);
                    if framed.send(Frame::Request(request)).await.is_err() {
                        break;
                    }
                }
                Some(Command::Goodbye) | None => {
                    // Ignore send errors -- the peer may already be gone.
                    let _ = framed.send(Frame::Goodbye).await;
                    break;
                }
            },
            frame = framed.next() => match frame {
                Some(Ok(Frame::Response(response))) => {
                    match pending.remove(&response.correlation_id) {
                        // Ignore send errors -- the caller may have given up.
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => warn!(
                            correlation_id = response.correlation_id,
                            "response with no pending request"
                        ),
                    }
                }
                Some(Ok(Frame::Request(request))) => {
                    warn!(
                        operation = %request.operation,
                        "ignoring request frame from server"
                    );
                }
                Some(Ok(Frame::Goodbye)) | None => {
                    debug!("server closed the connection");
                    break;
                }
                Some(Err(error)) => {
                    warn!(%error, "client transport failed");
                    break;
                }
            },
        }
    }
    // `pending` drops here, failing every in-flight call with Closed.
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bosun_core::Outcome;

    use super::*;
    use crate::config::ServerConfig;
    use crate::handlers::register_builtin;
    use crate::lifecycle::ServerLifecycle;
    use crate::network::server::ManagementServer;
    use crate::network::ConnectionRegistry;
    use crate::pipeline::ManagementController;

    async fn spawn_server() -> (
        SocketAddr,
        Arc<ServerLifecycle>,
        Arc<ConnectionRegistry>,
    ) {
        let lifecycle = Arc::new(ServerLifecycle::new());
        let controller = Arc::new(ManagementController::new(Arc::clone(&lifecycle)));
        register_builtin(&controller);
        controller.finish_boot();

        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            drain_timeout_ms: 1_000,
            ..ServerConfig::default()
        };
        let mut server = ManagementServer::new(config, controller);
        let addr = server.start().await.unwrap();
        let registry = server.registry();
        tokio::spawn(server.serve());
        (addr, lifecycle, registry)
    }

    fn add_params(port: i64) -> ModelValue {
        let mut params = ModelValue::object();
        params.set("port", port).unwrap();
        params
    }

    #[tokio::test]
    async fn executes_operations_end_to_end() {
        let (addr, _lifecycle, _registry) = spawn_server().await;
        let client = ManagementClient::connect(addr).await.unwrap();

        let added = client
            .execute("/server=web".parse().unwrap(), "add", add_params(8080))
            .await
            .unwrap();
        assert!(added.is_success());

        let mut params = ModelValue::object();
        params.set("name", "port").unwrap();
        let read = client
            .execute("/server=web".parse().unwrap(), "read-attribute", params)
            .await
            .unwrap();
        assert!(read.is_success());
        assert_eq!(read.body.as_i64(), Some(8080));
    }

    #[tokio::test]
    async fn failed_operations_are_outcomes_not_errors() {
        let (addr, _lifecycle, _registry) = spawn_server().await;
        let client = ManagementClient::connect(addr).await.unwrap();

        let outcome = client
            .execute(
                PathAddress::root(),
                "no-such-operation",
                ModelValue::object(),
            )
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.outcome, Outcome::Failed);
        assert!(outcome
            .body
            .as_str()
            .is_some_and(|detail| detail.contains("no-such-operation")));
    }

    #[tokio::test]
    async fn concurrent_calls_resolve_to_their_callers() {
        let (addr, _lifecycle, _registry) = spawn_server().await;
        let client = Arc::new(ManagementClient::connect(addr).await.unwrap());

        let mut tasks = Vec::new();
        for slot in 0..8_i64 {
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let address: PathAddress = format!("/server=s{slot}").parse().unwrap();
                let added = client
                    .execute(address.clone(), "add", add_params(9000 + slot))
                    .await
                    .unwrap();
                assert!(added.is_success());

                let mut params = ModelValue::object();
                params.set("name", "port").unwrap();
                let read = client
                    .execute(address, "read-attribute", params)
                    .await
                    .unwrap();
                assert_eq!(read.body.as_i64(), Some(9000 + slot));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn server_shutdown_fails_callers_with_closed() {
        let (addr, lifecycle, _registry) = spawn_server().await;
        let client = ManagementClient::connect(addr).await.unwrap();

        // A round trip guarantees the connection is up before shutdown.
        let outcome = client
            .execute(PathAddress::root(), "read-resource", ModelValue::object())
            .await
            .unwrap();
        assert!(outcome.is_success());

        lifecycle.begin_shutdown();
        assert!(lifecycle.wait_for_drain(Duration::from_secs(1)).await);

        // The goodbye frame reaches the client task asynchronously; retry
        // until the closure is observed.
        let mut closed = false;
        for _ in 0..100 {
            match client
                .execute(PathAddress::root(), "read-resource", ModelValue::object())
                .await
            {
                Err(ClientError::Closed) => {
                    closed = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        assert!(closed, "client never observed the disconnect");
    }

    #[tokio::test]
    async fn goodbye_disconnects_from_the_server() {
        let (addr, _lifecycle, registry) = spawn_server().await;
        let client = ManagementClient::connect(addr).await.unwrap();

        // A round trip guarantees the server registered the connection.
        let outcome = client
            .execute(PathAddress::root(), "read-resource", ModelValue::object())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(registry.count(), 1);

        client.goodbye().await;

        let mut gone = false;
        for _ in 0..100 {
            if registry.count() == 0 {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gone, "server never dropped the connection");
    }

    #[tokio::test]
    async fn connect_to_a_dead_port_fails() {
        // Bind and immediately drop a listener to get a port nobody owns.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ManagementClient::connect(addr).await;
        assert!(matches!(result, Err(ClientError::Connect(_))));
    }
}
