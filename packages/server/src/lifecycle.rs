//! Server lifecycle phases and graceful shutdown.
//!
//! Uses `ArcSwap` for lock-free phase reads and an atomic counter with RAII
//! guards for accurate in-flight operation tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server lifecycle phase.
///
/// Phase machine: Booting -> Serving -> Draining -> Stopped. Transitions
/// are one-way; in particular the boot window never reopens, which is what
/// makes boot-only operations safe to gate on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Applying the boot operation sequence. Boot-only operations are
    /// accepted, the listener is not up yet.
    Booting,
    /// Fully operational.
    Serving,
    /// Draining in-flight operations; no new connections are accepted.
    Draining,
    /// All in-flight operations completed, the process is on its way out.
    Stopped,
}

/// Coordinates the lifecycle phase, the shutdown signal, and in-flight
/// operation tracking.
///
/// 1. Operation dispatch samples [`ServerLifecycle::is_booting`] to gate
///    boot-only operations.
/// 2. The accept loop selects on [`ServerLifecycle::shutdown_receiver`].
/// 3. [`ServerLifecycle::begin_shutdown`] moves to Draining and signals.
/// 4. [`ServerLifecycle::wait_for_drain`] blocks until in-flight operations
///    complete, then marks the server Stopped.
#[derive(Debug)]
pub struct ServerLifecycle {
    phase: ArcSwap<Phase>,
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
}

impl ServerLifecycle {
    /// Creates a lifecycle in the `Booting` phase.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            phase: ArcSwap::from_pointee(Phase::Booting),
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        **self.phase.load()
    }

    /// Whether the boot window is still open.
    #[must_use]
    pub fn is_booting(&self) -> bool {
        self.phase() == Phase::Booting
    }

    /// Closes the boot window: Booting -> Serving.
    ///
    /// Calling it in any later phase is a no-op; the boot window must not
    /// reopen once closed.
    pub fn finish_boot(&self) {
        if self.phase() == Phase::Booting {
            self.phase.store(Arc::new(Phase::Serving));
            tracing::info!("boot complete, serving");
        }
    }

    /// Initiates graceful shutdown: moves to `Draining` and signals every
    /// shutdown receiver.
    pub fn begin_shutdown(&self) {
        self.phase.store(Arc::new(Phase::Draining));
        // Receivers may all be gone already; that is fine.
        let _ = self.shutdown_signal.send(true);
    }

    /// A receiver that observes the shutdown signal.
    ///
    /// Accept loops select on this alongside their main work.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// An RAII guard tracking one in-flight operation.
    ///
    /// The counter is incremented now and decremented when the guard drops,
    /// panicking handlers included.
    #[must_use]
    pub fn track(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of operations currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight operations to finish, up to `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` when the count reaches zero;
    /// returns `false` leaving the phase at `Draining` on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.phase.store(Arc::new(Phase::Stopped));
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            // Poll at 10ms intervals to avoid busy-waiting.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
