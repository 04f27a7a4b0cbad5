//! # Shutdown Coordination
//!
//! Drives the process through `Running -> Draining -> Terminated`. An
//! interrupt signal cancels cooperative foreground work through a
//! [`CancellationToken`]; the drain phase then gets a bounded grace period to
//! flush background work before the process exits.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time the drain phase may take before it is cut short
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Shutdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownState {
    /// Normal operation
    Running,
    /// Flushing background work
    Draining,
    /// Drain finished or grace period elapsed
    Terminated,
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownState::Running => write!(f, "RUNNING"),
            ShutdownState::Draining => write!(f, "DRAINING"),
            ShutdownState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Coordinates interrupt handling and the bounded drain on exit
#[derive(Debug)]
pub struct ShutdownCoordinator {
    /// Service name used in log lines
    service_name: String,
    /// Cancelled when an interrupt arrives
    token: CancellationToken,
    /// Current state
    state_tx: watch::Sender<ShutdownState>,
    /// Upper bound on the drain phase
    grace_period: Duration,
}

impl ShutdownCoordinator {
    /// Creates a coordinator in the `Running` state
    pub fn new<S: Into<String>>(service_name: S) -> Self {
        let (state_tx, _) = watch::channel(ShutdownState::Running);
        Self {
            service_name: service_name.into(),
            token: CancellationToken::new(),
            state_tx,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Set the maximum time to wait for the drain phase
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// A token for foreground work; cancelled on interrupt
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn state(&self) -> ShutdownState {
        *self.state_tx.borrow()
    }

    /// Get a receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state_tx.subscribe()
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels foreground work. Does not wait for anything.
    pub fn interrupt(&self) {
        if !self.token.is_cancelled() {
            info!(service = %self.service_name, "Interrupt received, cancelling foreground work");
            self.token.cancel();
        }
    }

    /// Spawns a task that turns SIGINT into [`ShutdownCoordinator::interrupt`].
    ///
    /// The listener is registered before this returns, so a signal arriving
    /// right after the call is not lost.
    pub fn install_signal_handler(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        let service_name = self.service_name.clone();
        let listener = interrupt_listener();
        tokio::spawn(async move {
            let mut listener = match listener {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(service = %service_name, error = %e, "Unable to listen for SIGINT");
                    return;
                }
            };
            tokio::select! {
                received = listener.recv() => {
                    if received.is_some() {
                        info!(service = %service_name, "SIGINT received");
                        token.cancel();
                    }
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Runs the drain future bounded by the grace period.
    ///
    /// Returns `true` if the future finished in time.
    pub async fn drain<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()>,
    {
        self.state_tx.send_replace(ShutdownState::Draining);
        debug!(
            service = %self.service_name,
            grace_ms = self.grace_period.as_millis() as u64,
            "Draining background work"
        );

        let completed = match timeout(self.grace_period, work).await {
            Ok(()) => true,
            Err(_) => {
                debug!(service = %self.service_name, "Drain cut short by grace period");
                false
            }
        };

        self.state_tx.send_replace(ShutdownState::Terminated);
        completed
    }
}

#[cfg(unix)]
fn interrupt_listener() -> std::io::Result<tokio::signal::unix::Signal> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::interrupt())
}

#[cfg(windows)]
fn interrupt_listener() -> std::io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}
