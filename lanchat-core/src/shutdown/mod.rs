//! Shutdown coordination
//!
//! Signals and the `/quit` command both end up here. The chat loop never gets cancelled in the
//! middle of a packet: it checks its `ShutdownListener` between iterations.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

/// What asked the session to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or Ctrl+C
    Interrupted,
    /// SIGTERM
    Terminated,
    /// The user asked to leave
    UserQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
}

pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    shutdown_tx: broadcast::Sender<ShutdownReason>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            shutdown_tx,
        }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.shutdown_tx.subscribe(),
        }
    }

    /// Request a shutdown; only the first request is broadcast
    pub async fn shutdown(&self, reason: ShutdownReason) {
        let mut state = self.state.write().await;
        if *state != ShutdownState::Running {
            warn!(?reason, "Shutdown already in progress");
            return;
        }
        *state = ShutdownState::ShuttingDown;
        drop(state);

        info!(?reason, "Initiating shutdown");
        if self.shutdown_tx.send(reason).is_err() {
            // Nobody subscribed yet; the state flag still records the request.
            warn!("No shutdown listeners registered");
        }
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.state.read().await == ShutdownState::ShuttingDown
    }

    pub async fn state(&self) -> ShutdownState {
        *self.state.read().await
    }
}

/// Receiving end held by a session loop
pub struct ShutdownListener {
    rx: broadcast::Receiver<ShutdownReason>,
}

impl ShutdownListener {
    /// Non-blocking check for a pending request
    pub fn requested(&mut self) -> Option<ShutdownReason> {
        match self.rx.try_recv() {
            Ok(reason) => Some(reason),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Lagged(_)) => self.requested(),
            // Coordinator dropped: treat as a request so loops cannot outlive it.
            Err(broadcast::error::TryRecvError::Closed) => Some(ShutdownReason::Terminated),
        }
    }

    pub async fn wait(&mut self) -> ShutdownReason {
        loop {
            match self.rx.recv().await {
                Ok(reason) => return reason,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return ShutdownReason::Terminated,
            }
        }
    }
}

/// Map SIGINT/SIGTERM to a shutdown request
#[cfg(unix)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                coordinator.shutdown(ShutdownReason::Terminated).await;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                coordinator.shutdown(ShutdownReason::Interrupted).await;
            }
        }
    });
}

#[cfg(windows)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("Received Ctrl+C");
        coordinator.shutdown(ShutdownReason::Interrupted).await;
    });
}
