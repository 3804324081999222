use crate::error::Result;
use crate::logging::log_bridge_event;
use crate::process::{BridgeContext, BridgePhase, ServerSupervisor};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    InputClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "SIGINT"),
            ShutdownReason::Terminate => write!(f, "SIGTERM"),
            ShutdownReason::InputClosed => write!(f, "input closed"),
        }
    }
}

/// Interrupt and termination signal listeners
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownReason {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownReason::Interrupt,
            _ = self.terminate.recv() => ShutdownReason::Terminate,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ShutdownReason {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownReason::Interrupt,
            Err(_) => std::future::pending().await,
        }
    }
}

/// Runs the coordinated shutdown: set the flag, stop an owned server, exit 0.
pub struct ShutdownCoordinator {
    context: Arc<BridgeContext>,
}

impl ShutdownCoordinator {
    pub fn new(context: Arc<BridgeContext>) -> Self {
        Self { context }
    }

    /// Returns the process exit status. Safe to call more than once; only
    /// the first call signals the server.
    pub fn shutdown(&self, supervisor: &mut ServerSupervisor, reason: ShutdownReason) -> i32 {
        if !self.context.begin_shutdown() {
            debug!("Shutdown already in progress, ignoring {}", reason);
            return 0;
        }

        info!("Received {}, shutting down", reason);
        log_bridge_event("shutdown", &reason.to_string());

        if !supervisor.terminate() {
            debug!("No owned Serena server to stop");
        }

        if let Err(e) = self.context.advance(BridgePhase::Exit) {
            debug!("Phase not advanced on shutdown: {}", e);
        }

        0
    }
}
