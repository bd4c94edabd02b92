//! # escrowflow-orchestrator
//!
//! Drives one two-party swap end to end: provisions assets and holding
//! accounts, derives the escrow, then submits initialize, deposit-maker,
//! deposit-taker and execute one transaction at a time.
//!
//! - [`FlowGuard`]: one flow in flight per orchestrator
//! - [`AssetProvisioner`]: asset classes, holding accounts, initial funding
//! - [`EscrowPlan`]: the four escrow steps as data
//! - [`FlowObserver`]: receives [`FlowEvent`]s as the run progresses
//! - [`EscrowOrchestrator`]: the entry point, returning a
//!   [`SettlementReceipt`](escrowflow_types::SettlementReceipt)

pub mod events;
pub mod guard;
pub mod orchestrator;
pub mod plan;
pub mod provisioner;

pub use events::{EventLog, FlowEvent, FlowObserver, TracingObserver};
pub use guard::{FlowGuard, FlowGuardToken};
pub use orchestrator::{AssetSource, EscrowOrchestrator, EscrowRequest};
pub use plan::{EscrowPlan, EscrowTerms, Party, PlannedStep};
pub use provisioner::{AssetProvisioner, CustodyAccount};
