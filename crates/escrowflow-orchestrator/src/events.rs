//! Flow events and observers.
//!
//! The orchestrator reports progress as [`FlowEvent`]s; presentation (logs,
//! progress output, audit trails) lives in observers.

use std::sync::Mutex;

use escrowflow_types::{Address, EscrowState, FlowRunId, FlowStep, Signature};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    StepStarted {
        step: FlowStep,
    },
    StepConfirmed {
        step: FlowStep,
        signature: Signature,
    },
    /// The escrow record moved along its lifecycle.
    StateChanged {
        escrow: Address,
        from: EscrowState,
        to: EscrowState,
    },
    StepFailed {
        step: FlowStep,
        error: String,
    },
    /// A failure left party funds in escrow custody. Needs an operator.
    FundsStranded {
        escrow: Address,
        step: FlowStep,
        /// Last state the orchestrator saw confirmed.
        last_confirmed: EscrowState,
    },
    Completed {
        escrow: Address,
        signatures: usize,
    },
}

pub trait FlowObserver: Send + Sync {
    fn on_event(&self, run_id: FlowRunId, event: &FlowEvent);
}

/// Writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FlowObserver for TracingObserver {
    fn on_event(&self, run_id: FlowRunId, event: &FlowEvent) {
        match event {
            FlowEvent::StepStarted { step } => {
                info!(%run_id, %step, ordinal = step.ordinal(), "step started");
            }
            FlowEvent::StepConfirmed { step, signature } => {
                info!(%run_id, %step, signature = %signature.short(), "step confirmed");
            }
            FlowEvent::StateChanged { escrow, from, to } => {
                info!(%run_id, escrow = %escrow.short(), %from, %to, "escrow state changed");
            }
            FlowEvent::StepFailed { step, error } => {
                warn!(%run_id, %step, %error, "step failed");
            }
            // The orchestrator logs stranded funds at error level itself.
            FlowEvent::FundsStranded { .. } => {}
            FlowEvent::Completed { escrow, signatures } => {
                info!(%run_id, escrow = %escrow.short(), signatures, "escrow flow completed");
            }
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FlowEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Steps in the order they confirmed.
    #[must_use]
    pub fn confirmed_steps(&self) -> Vec<FlowStep> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FlowEvent::StepConfirmed { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }
}

impl FlowObserver for EventLog {
    fn on_event(&self, _run_id: FlowRunId, event: &FlowEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}
