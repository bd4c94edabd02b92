//! Single-flight guard.
//!
//! One escrow flow may be in flight per orchestrator. The guard is acquired
//! before any ledger call and released when the returned token drops, so
//! every exit path (success, error, early return) releases it.

use std::sync::atomic::{AtomicBool, Ordering};

use escrowflow_types::{EscrowFlowError, Result};

/// Held/released flag owned by one orchestrator instance.
#[derive(Debug, Default)]
pub struct FlowGuard {
    held: AtomicBool,
}

impl FlowGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or fail with [`EscrowFlowError::AlreadyInProgress`]
    /// if another flow holds it.
    pub fn try_acquire(&self) -> Result<FlowGuardToken<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| FlowGuardToken { guard: self })
            .map_err(|_| EscrowFlowError::AlreadyInProgress)
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard. Releases on drop.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct FlowGuardToken<'a> {
    guard: &'a FlowGuard,
}

impl Drop for FlowGuardToken<'_> {
    fn drop(&mut self) {
        self.guard.held.store(false, Ordering::Release);
    }
}
