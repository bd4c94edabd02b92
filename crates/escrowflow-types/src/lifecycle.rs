//! # EscrowRecord lifecycle
//!
//! ## State Machine
//!
//! ```text
//!   UNINITIALIZED ──initialize──▶ INITIALIZED ──deposit-maker──▶ MAKER_DEPOSITED
//!                                                                     │
//!                                                               deposit-taker
//!                                                                     ▼
//!                             SETTLED ◀──────────execute──────── BOTH_DEPOSITED
//! ```
//!
//! Transitions are **monotonic** and strictly sequential: each state has
//! exactly one successor and nothing in this flow moves backwards. There is
//! no cancel or refund edge, so a record stuck in `MAKER_DEPOSITED` holds the
//! maker's funds until an operator intervenes.

use serde::{Deserialize, Serialize};

use crate::{Address, EscrowId};

/// Lifecycle state of one escrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EscrowState {
    /// No record exists at the derived address.
    Uninitialized,
    /// Terms recorded, custody accounts created, nothing deposited.
    Initialized,
    /// Maker's asset sits in escrow custody; taker has not deposited.
    MakerDeposited,
    /// Both assets sit in escrow custody.
    BothDeposited,
    /// Assets exchanged; custody accounts drained. Terminal.
    Settled,
}

impl EscrowState {
    /// The only state reachable from this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::Initialized),
            Self::Initialized => Some(Self::MakerDeposited),
            Self::MakerDeposited => Some(Self::BothDeposited),
            Self::BothDeposited => Some(Self::Settled),
            Self::Settled => None,
        }
    }

    /// Can this record transition to the given target state?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Settled
    }

    /// Whether escrow custody holds any party funds in this state.
    #[must_use]
    pub fn holds_funds(self) -> bool {
        matches!(self, Self::MakerDeposited | Self::BothDeposited)
    }
}

impl std::fmt::Display for EscrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::Initialized => write!(f, "INITIALIZED"),
            Self::MakerDeposited => write!(f, "MAKER_DEPOSITED"),
            Self::BothDeposited => write!(f, "BOTH_DEPOSITED"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}

/// On-ledger state of one swap, stored at the address derived from
/// `(maker, maker_asset, escrow_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub escrow_id: EscrowId,
    pub maker: Address,
    pub taker: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    /// Raw units of `maker_asset` the maker commits.
    pub maker_amount: u64,
    /// Raw units of `taker_asset` the taker commits.
    pub taker_amount: u64,
    /// Derivation nonce of the record address.
    pub bump: u8,
    pub state: EscrowState,
}

impl EscrowRecord {
    /// Advance to `target`.
    ///
    /// # Errors
    /// Returns [`crate::EscrowFlowError::Internal`] if the transition is not
    /// the single legal successor of the current state.
    pub fn advance(&mut self, target: EscrowState) -> crate::Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(crate::EscrowFlowError::Internal(format!(
                "escrow {} cannot move from {} to {target}",
                self.escrow_id, self.state
            )));
        }
        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EscrowRecord {
        EscrowRecord {
            escrow_id: EscrowId(1),
            maker: Address::new([1u8; 32]),
            taker: Address::new([2u8; 32]),
            maker_asset: Address::new([3u8; 32]),
            taker_asset: Address::new([4u8; 32]),
            maker_amount: 100,
            taker_amount: 100,
            bump: 254,
            state: EscrowState::Initialized,
        }
    }

    #[test]
    fn lifecycle_is_linear() {
        let mut state = EscrowState::Uninitialized;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(next));
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 5);
        assert!(state.is_terminal());
    }

    #[test]
    fn no_skipping_or_reversing() {
        assert!(!EscrowState::Initialized.can_transition_to(EscrowState::BothDeposited));
        assert!(!EscrowState::MakerDeposited.can_transition_to(EscrowState::Initialized));
        assert!(!EscrowState::Settled.can_transition_to(EscrowState::Uninitialized));
    }

    #[test]
    fn funds_held_only_mid_flow() {
        assert!(!EscrowState::Initialized.holds_funds());
        assert!(EscrowState::MakerDeposited.holds_funds());
        assert!(EscrowState::BothDeposited.holds_funds());
        assert!(!EscrowState::Settled.holds_funds());
    }

    #[test]
    fn advance_rejects_illegal_transition() {
        let mut rec = record();
        assert!(rec.advance(EscrowState::Settled).is_err());
        assert_eq!(rec.state, EscrowState::Initialized);
        rec.advance(EscrowState::MakerDeposited).unwrap();
        assert_eq!(rec.state, EscrowState::MakerDeposited);
    }

    #[test]
    fn state_display() {
        assert_eq!(EscrowState::MakerDeposited.to_string(), "MAKER_DEPOSITED");
        assert_eq!(EscrowState::Settled.to_string(), "SETTLED");
    }
}
