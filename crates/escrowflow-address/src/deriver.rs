//! Escrow and custody address derivation.

use escrowflow_types::{
    Address, EscrowFlowError, EscrowId, Result, constants,
    program::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID},
};
use tracing::debug;

use crate::pda::{find_program_address, is_on_curve};

/// Every address one escrow run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowAddresses {
    /// The escrow record.
    pub escrow: Address,
    pub bump: u8,
    /// Escrow-owned custody of the maker asset.
    pub escrow_maker_custody: Address,
    /// Escrow-owned custody of the taker asset.
    pub escrow_taker_custody: Address,
    /// Maker's holding account for the maker asset (deposit source).
    pub maker_source: Address,
    /// Maker's holding account for the taker asset (settlement destination).
    pub maker_receive: Address,
    /// Taker's holding account for the taker asset (deposit source).
    pub taker_source: Address,
    /// Taker's holding account for the maker asset (settlement destination).
    pub taker_receive: Address,
}

/// Stateless deriver bound to one settlement program.
///
/// All methods are pure: no ledger access, same inputs give the same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowDeriver {
    program_id: Address,
}

impl EscrowDeriver {
    #[must_use]
    pub fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    #[must_use]
    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// Escrow record address for `(maker, maker_asset, escrow_id)`.
    ///
    /// # Errors
    /// [`EscrowFlowError::NoViableBump`] if no bump yields an off-curve address.
    pub fn derive_escrow(
        &self,
        maker: &Address,
        maker_asset: &Address,
        escrow_id: EscrowId,
    ) -> Result<(Address, u8)> {
        let id = escrow_id.to_le_bytes();
        let (escrow, bump) = find_program_address(
            &[
                constants::ESCROW_SEED,
                maker.as_bytes(),
                maker_asset.as_bytes(),
                &id,
            ],
            &self.program_id,
        )?;
        debug!(%escrow_id, escrow = %escrow.short(), bump, "derived escrow address");
        Ok((escrow, bump))
    }

    /// Associated custody account of `owner` for `asset`.
    ///
    /// Derived addresses (such as the escrow record) are off curve; they may
    /// own custody accounts only when `allow_owner_off_curve` is set.
    ///
    /// # Errors
    /// [`EscrowFlowError::OwnerOffCurve`] if `owner` is off curve and that is
    /// not allowed.
    pub fn derive_custody_account(
        &self,
        owner: &Address,
        asset: &Address,
        allow_owner_off_curve: bool,
    ) -> Result<Address> {
        if !allow_owner_off_curve && !is_on_curve(owner) {
            return Err(EscrowFlowError::OwnerOffCurve(*owner));
        }
        let (address, _) = find_program_address(
            &[
                owner.as_bytes(),
                TOKEN_PROGRAM_ID.as_bytes(),
                asset.as_bytes(),
            ],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        )?;
        Ok(address)
    }

    /// Derive the escrow record, both custody accounts and the four party
    /// holding accounts.
    ///
    /// # Errors
    /// Propagates derivation failures; fails with
    /// [`EscrowFlowError::OwnerOffCurve`] if a party identity is off curve.
    pub fn derive_all(
        &self,
        maker: &Address,
        taker: &Address,
        maker_asset: &Address,
        taker_asset: &Address,
        escrow_id: EscrowId,
    ) -> Result<EscrowAddresses> {
        let (escrow, bump) = self.derive_escrow(maker, maker_asset, escrow_id)?;
        Ok(EscrowAddresses {
            escrow,
            bump,
            escrow_maker_custody: self.derive_custody_account(&escrow, maker_asset, true)?,
            escrow_taker_custody: self.derive_custody_account(&escrow, taker_asset, true)?,
            maker_source: self.derive_custody_account(maker, maker_asset, false)?,
            maker_receive: self.derive_custody_account(maker, taker_asset, false)?,
            taker_source: self.derive_custody_account(taker, taker_asset, false)?,
            taker_receive: self.derive_custody_account(taker, maker_asset, false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrowflow_types::{Keypair, program::DEFAULT_SETTLEMENT_PROGRAM_ID};

    fn deriver() -> EscrowDeriver {
        EscrowDeriver::new(DEFAULT_SETTLEMENT_PROGRAM_ID)
    }

    #[test]
    fn derivation_is_pure() {
        let maker = Keypair::generate().address();
        let asset = Address::new_unique();
        let a = deriver().derive_escrow(&maker, &asset, EscrowId(12345)).unwrap();
        let b = deriver().derive_escrow(&maker, &asset, EscrowId(12345)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn each_input_changes_escrow_address() {
        let maker = Keypair::generate().address();
        let asset = Address::new_unique();
        let (base, _) = deriver().derive_escrow(&maker, &asset, EscrowId(1)).unwrap();

        let (other_id, _) = deriver().derive_escrow(&maker, &asset, EscrowId(2)).unwrap();
        let other_maker = Keypair::generate().address();
        let (by_maker, _) = deriver().derive_escrow(&other_maker, &asset, EscrowId(1)).unwrap();
        let (by_asset, _) = deriver()
            .derive_escrow(&maker, &Address::new_unique(), EscrowId(1))
            .unwrap();
        let (by_program, _) = EscrowDeriver::new(Address::new([42u8; 32]))
            .derive_escrow(&maker, &asset, EscrowId(1))
            .unwrap();

        for other in [other_id, by_maker, by_asset, by_program] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn escrow_is_off_curve() {
        let maker = Keypair::generate().address();
        let (escrow, _) = deriver()
            .derive_escrow(&maker, &Address::new_unique(), EscrowId(7))
            .unwrap();
        assert!(!is_on_curve(&escrow));
    }

    #[test]
    fn off_curve_owner_requires_flag() {
        let maker = Keypair::generate().address();
        let asset = Address::new_unique();
        let (escrow, _) = deriver().derive_escrow(&maker, &asset, EscrowId(7)).unwrap();

        let err = deriver()
            .derive_custody_account(&escrow, &asset, false)
            .unwrap_err();
        assert!(matches!(err, EscrowFlowError::OwnerOffCurve(a) if a == escrow));
        assert!(deriver().derive_custody_account(&escrow, &asset, true).is_ok());
    }

    #[test]
    fn custody_account_independent_of_settlement_program() {
        let owner = Keypair::generate().address();
        let asset = Address::new_unique();
        let a = deriver().derive_custody_account(&owner, &asset, false).unwrap();
        let b = EscrowDeriver::new(Address::new([42u8; 32]))
            .derive_custody_account(&owner, &asset, false)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_all_yields_distinct_accounts() {
        let maker = Keypair::generate().address();
        let taker = Keypair::generate().address();
        let maker_asset = Address::new_unique();
        let taker_asset = Address::new_unique();
        let all = deriver()
            .derive_all(&maker, &taker, &maker_asset, &taker_asset, EscrowId(12345))
            .unwrap();
        let accounts = [
            all.escrow,
            all.escrow_maker_custody,
            all.escrow_taker_custody,
            all.maker_source,
            all.maker_receive,
            all.taker_source,
            all.taker_receive,
        ];
        for (i, a) in accounts.iter().enumerate() {
            for b in &accounts[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            (all.escrow, all.bump),
            deriver().derive_escrow(&maker, &maker_asset, EscrowId(12345)).unwrap()
        );
    }
}
