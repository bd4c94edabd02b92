//! The ordered steps of one escrow run and the step table that binds the
//! four escrow steps to lifecycle transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EscrowState;

/// One submitted-and-confirmed unit of work in an escrow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStep {
    /// Create both asset classes.
    CreateAssets,
    /// Ensure the four party holding accounts exist.
    ProvisionAccounts,
    /// Mint the initial supply into each party's own account.
    FundAccounts,
    Initialize,
    DepositMaker,
    DepositTaker,
    Execute,
}

impl FlowStep {
    /// Every step in execution order.
    pub const ALL: [Self; 7] = [
        Self::CreateAssets,
        Self::ProvisionAccounts,
        Self::FundAccounts,
        Self::Initialize,
        Self::DepositMaker,
        Self::DepositTaker,
        Self::Execute,
    ];

    /// 1-based position among [`FlowStep::ALL`].
    #[must_use]
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    /// Setup steps are not part of the escrow record lifecycle.
    #[must_use]
    pub fn is_provisioning(self) -> bool {
        matches!(
            self,
            Self::CreateAssets | Self::ProvisionAccounts | Self::FundAccounts
        )
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CreateAssets => "create-assets",
            Self::ProvisionAccounts => "provision-accounts",
            Self::FundAccounts => "fund-accounts",
            Self::Initialize => "initialize",
            Self::DepositMaker => "deposit-maker",
            Self::DepositTaker => "deposit-taker",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// A row of the escrow step table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTransition {
    pub step: FlowStep,
    /// Record state the ledger requires before accepting the step.
    pub requires: EscrowState,
    /// Record state after the step confirms.
    pub yields: EscrowState,
}

/// The escrow lifecycle, one row per submitted instruction, in order.
pub const ESCROW_STEP_TABLE: [StepTransition; 4] = [
    StepTransition {
        step: FlowStep::Initialize,
        requires: EscrowState::Uninitialized,
        yields: EscrowState::Initialized,
    },
    StepTransition {
        step: FlowStep::DepositMaker,
        requires: EscrowState::Initialized,
        yields: EscrowState::MakerDeposited,
    },
    StepTransition {
        step: FlowStep::DepositTaker,
        requires: EscrowState::MakerDeposited,
        yields: EscrowState::BothDeposited,
    },
    StepTransition {
        step: FlowStep::Execute,
        requires: EscrowState::BothDeposited,
        yields: EscrowState::Settled,
    },
];
