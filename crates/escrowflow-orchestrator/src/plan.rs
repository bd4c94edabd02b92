//! The four escrow steps as data.
//!
//! [`EscrowPlan`] pairs each row of the step table with the instruction to
//! submit and the party that signs and pays for it. Building a plan is pure;
//! the orchestrator only walks it.

use escrowflow_address::EscrowAddresses;
use escrowflow_types::{
    Address, ESCROW_STEP_TABLE, EscrowId, FlowStep, Instruction, StepTransition,
    program::settlement::{self, DepositAccounts, ExecuteAccounts, InitializeAccounts},
};

/// Which counterparty signs a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Maker,
    Taker,
}

impl Party {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Maker => "maker",
            Self::Taker => "taker",
        }
    }
}

/// What the two parties agreed to swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowTerms {
    pub escrow_id: EscrowId,
    pub maker: Address,
    pub taker: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    pub maker_amount: u64,
    pub taker_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub transition: StepTransition,
    pub signer: Party,
    pub instruction: Instruction,
}

impl PlannedStep {
    #[must_use]
    pub fn step(&self) -> FlowStep {
        self.transition.step
    }
}

#[derive(Debug, Clone)]
pub struct EscrowPlan {
    terms: EscrowTerms,
    addresses: EscrowAddresses,
    steps: Vec<PlannedStep>,
}

impl EscrowPlan {
    #[must_use]
    pub fn new(program_id: Address, terms: EscrowTerms, addresses: EscrowAddresses) -> Self {
        let steps = ESCROW_STEP_TABLE
            .iter()
            .filter_map(|transition| {
                let (signer, instruction) =
                    instruction_for(program_id, transition.step, &terms, &addresses)?;
                Some(PlannedStep {
                    transition: *transition,
                    signer,
                    instruction,
                })
            })
            .collect();
        Self {
            terms,
            addresses,
            steps,
        }
    }

    #[must_use]
    pub fn terms(&self) -> &EscrowTerms {
        &self.terms
    }

    #[must_use]
    pub fn addresses(&self) -> &EscrowAddresses {
        &self.addresses
    }

    #[must_use]
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }
}

/// Signer and settlement instruction for an escrow step. Provisioning steps
/// have no settlement instruction.
fn instruction_for(
    program_id: Address,
    step: FlowStep,
    terms: &EscrowTerms,
    addresses: &EscrowAddresses,
) -> Option<(Party, Instruction)> {
    let planned = match step {
        FlowStep::CreateAssets | FlowStep::ProvisionAccounts | FlowStep::FundAccounts => {
            return None;
        }
        FlowStep::Initialize => (
            Party::Maker,
            settlement::initialize(
                program_id,
                &InitializeAccounts {
                    escrow: addresses.escrow,
                    maker: terms.maker,
                    taker: terms.taker,
                    maker_asset: terms.maker_asset,
                    taker_asset: terms.taker_asset,
                    escrow_maker_custody: addresses.escrow_maker_custody,
                    escrow_taker_custody: addresses.escrow_taker_custody,
                },
                terms.escrow_id,
                terms.maker_amount,
                terms.taker_amount,
            ),
        ),
        FlowStep::DepositMaker => (
            Party::Maker,
            settlement::deposit_maker(
                program_id,
                &DepositAccounts {
                    escrow: addresses.escrow,
                    depositor: terms.maker,
                    source: addresses.maker_source,
                    escrow_custody: addresses.escrow_maker_custody,
                    asset: terms.maker_asset,
                },
            ),
        ),
        FlowStep::DepositTaker => (
            Party::Taker,
            settlement::deposit_taker(
                program_id,
                &DepositAccounts {
                    escrow: addresses.escrow,
                    depositor: terms.taker,
                    source: addresses.taker_source,
                    escrow_custody: addresses.escrow_taker_custody,
                    asset: terms.taker_asset,
                },
            ),
        ),
        FlowStep::Execute => (
            Party::Maker,
            settlement::execute(
                program_id,
                &ExecuteAccounts {
                    escrow: addresses.escrow,
                    maker: terms.maker,
                    maker_receive: addresses.maker_receive,
                    taker_receive: addresses.taker_receive,
                    escrow_maker_custody: addresses.escrow_maker_custody,
                    escrow_taker_custody: addresses.escrow_taker_custody,
                },
            ),
        ),
    };
    Some(planned)
}

#[cfg(test)]
mod tests {
    use escrowflow_address::EscrowDeriver;
    use escrowflow_types::{
        EscrowState,
        program::{DEFAULT_SETTLEMENT_PROGRAM_ID, settlement::SettlementInstruction},
    };

    use super::*;

    fn plan() -> EscrowPlan {
        let terms = EscrowTerms {
            escrow_id: EscrowId(12345),
            maker: Address::new_unique(),
            taker: Address::new_unique(),
            maker_asset: Address::new_unique(),
            taker_asset: Address::new_unique(),
            maker_amount: 100,
            taker_amount: 250,
        };
        let addresses = EscrowDeriver::new(DEFAULT_SETTLEMENT_PROGRAM_ID)
            .derive_all(
                &terms.maker,
                &terms.taker,
                &terms.maker_asset,
                &terms.taker_asset,
                terms.escrow_id,
            )
            .unwrap();
        EscrowPlan::new(DEFAULT_SETTLEMENT_PROGRAM_ID, terms, addresses)
    }

    #[test]
    fn steps_follow_table_order() {
        let plan = plan();
        let steps: Vec<_> = plan.steps().iter().map(PlannedStep::step).collect();
        assert_eq!(
            steps,
            vec![
                FlowStep::Initialize,
                FlowStep::DepositMaker,
                FlowStep::DepositTaker,
                FlowStep::Execute
            ]
        );
        assert_eq!(plan.steps()[0].transition.requires, EscrowState::Uninitialized);
        assert_eq!(plan.steps()[3].transition.yields, EscrowState::Settled);
    }

    #[test]
    fn only_deposit_taker_is_signed_by_taker() {
        let plan = plan();
        let signers: Vec<_> = plan.steps().iter().map(|s| s.signer).collect();
        assert_eq!(
            signers,
            vec![Party::Maker, Party::Maker, Party::Taker, Party::Maker]
        );
    }

    #[test]
    fn instructions_decode_to_matching_step() {
        let plan = plan();
        for planned in plan.steps() {
            assert_eq!(planned.instruction.program_id, DEFAULT_SETTLEMENT_PROGRAM_ID);
            let decoded = SettlementInstruction::unpack(&planned.instruction.data).unwrap();
            assert_eq!(decoded.step(), planned.step());
        }
    }

    #[test]
    fn initialize_carries_terms() {
        let plan = plan();
        let decoded = SettlementInstruction::unpack(&plan.steps()[0].instruction.data).unwrap();
        assert_eq!(
            decoded,
            SettlementInstruction::Initialize {
                escrow_id: EscrowId(12345),
                maker_amount: 100,
                taker_amount: 250,
            }
        );
    }

    #[test]
    fn provisioning_steps_have_no_settlement_instruction() {
        let plan = plan();
        for step in [
            FlowStep::CreateAssets,
            FlowStep::ProvisionAccounts,
            FlowStep::FundAccounts,
        ] {
            assert!(
                instruction_for(
                    DEFAULT_SETTLEMENT_PROGRAM_ID,
                    step,
                    plan.terms(),
                    plan.addresses()
                )
                .is_none(),
                "{step}"
            );
        }
    }

    #[test]
    fn every_step_targets_the_escrow_record() {
        let plan = plan();
        let escrow = plan.addresses().escrow;
        for planned in plan.steps() {
            assert_eq!(planned.instruction.account(0), Some(escrow));
        }
    }
}
