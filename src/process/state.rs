use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Lifecycle phases of the whole bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgePhase {
    Init,
    Probing,
    /// A server was already listening; nothing was spawned
    Attached,
    /// A server was spawned and is not reachable yet
    Starting,
    /// Event stream and router are running
    Ready,
    ShuttingDown,
    Exit,
}

impl BridgePhase {
    pub fn can_transition_to(&self, next: BridgePhase) -> bool {
        use BridgePhase::*;

        match (self, next) {
            (Init, Probing) => true,
            (Probing, Attached | Starting) => true,
            (Attached, Ready) => true,
            (Starting, Ready | Exit) => true,
            (Ready, Exit) => true,
            (ShuttingDown, Exit) => true,
            (Exit, _) | (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgePhase::Exit)
    }
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgePhase::Init => "init",
            BridgePhase::Probing => "probing",
            BridgePhase::Attached => "attached",
            BridgePhase::Starting => "starting",
            BridgePhase::Ready => "ready",
            BridgePhase::ShuttingDown => "shutting_down",
            BridgePhase::Exit => "exit",
        };
        write!(f, "{name}")
    }
}

/// Coordination state for one bridge instance.
///
/// The shutdown flag is the only value read across component boundaries. It
/// is set once and never cleared.
#[derive(Debug)]
pub struct BridgeContext {
    shutting_down: AtomicBool,
    phase: Mutex<BridgePhase>,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            phase: Mutex::new(BridgePhase::Init),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Set the shutdown flag. Returns true only for the first caller.
    pub fn begin_shutdown(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);
        if first {
            // Best effort: a bridge already in Exit stays there
            let _ = self.advance(BridgePhase::ShuttingDown);
        }
        first
    }

    pub fn phase(&self) -> BridgePhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn advance(&self, next: BridgePhase) -> Result<()> {
        let mut phase = self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !phase.can_transition_to(next) {
            return Err(BridgeError::TransitionError(format!(
                "{} -> {}",
                *phase, next
            )));
        }

        debug!("Bridge phase: {} -> {}", *phase, next);
        *phase = next;
        Ok(())
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}
