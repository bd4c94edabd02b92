//! Fault injection for the local ledger.
//!
//! A fault is keyed by [`InstructionKind`] and fires for every transaction
//! containing an instruction of that kind until cleared.

use std::collections::HashMap;

use escrowflow_types::{
    Address, FlowStep, Instruction, InstructionError,
    program::{
        ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
        settlement::SettlementInstruction,
        system::SystemInstruction,
        token::TokenInstruction,
    },
};

/// What an instruction does, independent of its accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    CreateAccount,
    InitializeMint,
    MintTo,
    CreateAssociatedAccount,
    Initialize,
    DepositMaker,
    DepositTaker,
    Execute,
}

impl InstructionKind {
    /// Classify by program and instruction data. `None` for undecodable data
    /// or unknown programs.
    #[must_use]
    pub fn classify(ix: &Instruction, settlement_program: &Address) -> Option<Self> {
        if ix.program_id == SYSTEM_PROGRAM_ID {
            SystemInstruction::unpack(&ix.data)
                .ok()
                .map(|_| Self::CreateAccount)
        } else if ix.program_id == TOKEN_PROGRAM_ID {
            match TokenInstruction::unpack(&ix.data).ok()? {
                TokenInstruction::InitializeMint2 { .. } => Some(Self::InitializeMint),
                TokenInstruction::MintTo { .. } => Some(Self::MintTo),
            }
        } else if ix.program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
            Some(Self::CreateAssociatedAccount)
        } else if ix.program_id == *settlement_program {
            SettlementInstruction::unpack(&ix.data)
                .ok()
                .and_then(|s| Self::from_step(s.step()))
        } else {
            None
        }
    }

    /// The settlement instruction kind for an escrow step.
    #[must_use]
    pub fn from_step(step: FlowStep) -> Option<Self> {
        match step {
            FlowStep::Initialize => Some(Self::Initialize),
            FlowStep::DepositMaker => Some(Self::DepositMaker),
            FlowStep::DepositTaker => Some(Self::DepositTaker),
            FlowStep::Execute => Some(Self::Execute),
            FlowStep::CreateAssets | FlowStep::ProvisionAccounts | FlowStep::FundAccounts => None,
        }
    }
}

/// A scripted misbehavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The node refuses the transaction outright; nothing lands.
    RejectSubmission,
    /// The instruction fails with this error. Caught by preflight unless it
    /// is skipped, in which case the failure lands and shows in the report.
    FailExecution(InstructionError),
    /// The transaction lands but its confirmation never arrives.
    DropConfirmation,
    /// The node accepts the transaction but it never lands; confirmation
    /// reports the blockhash as expired.
    ExpireBlockhash,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FaultPlan {
    faults: HashMap<InstructionKind, Fault>,
}

impl FaultPlan {
    pub fn inject(&mut self, kind: InstructionKind, fault: Fault) {
        self.faults.insert(kind, fault);
    }

    pub fn clear(&mut self) {
        self.faults.clear();
    }

    /// First fault matching an instruction, with that instruction's index.
    pub fn lookup(&self, kinds: &[Option<InstructionKind>]) -> Option<(usize, Fault)> {
        kinds.iter().enumerate().find_map(|(index, kind)| {
            kind.and_then(|k| self.faults.get(&k))
                .map(|fault| (index, fault.clone()))
        })
    }
}
