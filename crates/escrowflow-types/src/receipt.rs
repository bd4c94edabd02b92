//! Settlement receipt: the audit record of one completed escrow run.
//!
//! Names every step signature in order, the derived escrow address, and
//! (when they could be read) the final balances of all six accounts involved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, EscrowId, EscrowState, FlowRunId, FlowStep, Signature, TokenAmount};

/// The confirmed signature of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSignature {
    pub step: FlowStep,
    pub signature: Signature,
}

/// Balances read back after settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalBalances {
    pub maker_maker_asset: TokenAmount,
    pub maker_taker_asset: TokenAmount,
    pub taker_taker_asset: TokenAmount,
    pub taker_maker_asset: TokenAmount,
    pub escrow_maker_custody: TokenAmount,
    pub escrow_taker_custody: TokenAmount,
}

impl FinalBalances {
    /// Both escrow custody accounts are empty.
    #[must_use]
    pub fn custody_drained(&self) -> bool {
        self.escrow_maker_custody.is_zero() && self.escrow_taker_custody.is_zero()
    }
}

/// Proof that an escrow run reached `Settled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub run_id: FlowRunId,
    pub escrow_id: EscrowId,
    /// Derived escrow record address.
    pub escrow: Address,
    pub escrow_bump: u8,
    pub maker: Address,
    pub taker: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    pub maker_amount: u64,
    pub taker_amount: u64,
    /// initialize, deposit-maker, deposit-taker, execute, in that order.
    pub signatures: Vec<StepSignature>,
    /// Signatures of setup transactions (asset creation, accounts, funding).
    pub provisioning_signatures: Vec<StepSignature>,
    pub final_state: EscrowState,
    /// `None` if the balances could not be read back after settlement. The
    /// swap itself is final either way.
    pub balances: Option<FinalBalances>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SettlementReceipt {
    /// Signature of the given escrow step, if it is in the receipt.
    #[must_use]
    pub fn signature_for(&self, step: FlowStep) -> Option<Signature> {
        self.signatures
            .iter()
            .chain(&self.provisioning_signatures)
            .find(|s| s.step == step)
            .map(|s| s.signature)
    }

    /// Wall-clock duration of the run in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    /// Returns [`crate::EscrowFlowError::Serialization`] if encoding fails.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> SettlementReceipt {
        let amount = |raw| TokenAmount::new(raw, 6);
        let now = Utc::now();
        SettlementReceipt {
            run_id: FlowRunId::new(),
            escrow_id: EscrowId(12345),
            escrow: Address::new([1u8; 32]),
            escrow_bump: 255,
            maker: Address::new([2u8; 32]),
            taker: Address::new([3u8; 32]),
            maker_asset: Address::new([4u8; 32]),
            taker_asset: Address::new([5u8; 32]),
            maker_amount: 100,
            taker_amount: 100,
            signatures: vec![
                StepSignature {
                    step: FlowStep::Initialize,
                    signature: Signature([1u8; 64]),
                },
                StepSignature {
                    step: FlowStep::Execute,
                    signature: Signature([4u8; 64]),
                },
            ],
            provisioning_signatures: vec![StepSignature {
                step: FlowStep::CreateAssets,
                signature: Signature([9u8; 64]),
            }],
            final_state: EscrowState::Settled,
            balances: Some(FinalBalances {
                maker_maker_asset: amount(99_900),
                maker_taker_asset: amount(100),
                taker_taker_asset: amount(99_900),
                taker_maker_asset: amount(100),
                escrow_maker_custody: amount(0),
                escrow_taker_custody: amount(0),
            }),
            started_at: now,
            completed_at: now + chrono::Duration::milliseconds(250),
        }
    }

    #[test]
    fn signature_lookup() {
        let r = receipt();
        assert_eq!(r.signature_for(FlowStep::Execute), Some(Signature([4u8; 64])));
        assert_eq!(r.signature_for(FlowStep::CreateAssets), Some(Signature([9u8; 64])));
        assert_eq!(r.signature_for(FlowStep::DepositMaker), None);
    }

    #[test]
    fn custody_drained_and_duration() {
        let r = receipt();
        assert!(r.balances.is_some_and(|b| b.custody_drained()));
        assert_eq!(r.duration_ms(), 250);
    }

    #[test]
    fn json_names_state_and_steps() {
        let json = receipt().to_json_pretty().unwrap();
        assert!(json.contains("\"Settled\""));
        assert!(json.contains("\"execute\""));
        let back: SettlementReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.escrow_id, EscrowId(12345));
        assert_eq!(back.balances, receipt().balances);
    }
}
