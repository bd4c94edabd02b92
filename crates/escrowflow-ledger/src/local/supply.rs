//! Supply conservation check.
//!
//! For every asset class:
//! ```text
//! mint.supply == Σ custody_account.amount   (over accounts of that asset)
//! ```
//! Only `MintTo` changes supply; deposits and settlement move units between
//! accounts, so a run of the escrow flow must leave the equation intact.

use std::collections::HashMap;

use escrowflow_types::Address;
use thiserror::Error;

use super::bank::Bank;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("supply of asset {mint} is {supply} but accounts hold {held}")]
pub struct SupplyMismatch {
    pub mint: Address,
    pub supply: u64,
    pub held: u128,
}

/// # Errors
/// The first asset whose holdings do not sum to its supply.
pub(crate) fn verify(bank: &Bank) -> Result<(), SupplyMismatch> {
    let mut held: HashMap<Address, u128> = HashMap::new();
    for (_, account) in bank.token_accounts() {
        *held.entry(account.mint).or_default() += u128::from(account.amount);
    }
    for (mint, state) in bank.mints() {
        let total = held.get(mint).copied().unwrap_or(0);
        if total != u128::from(state.supply) {
            return Err(SupplyMismatch {
                mint: *mint,
                supply: state.supply,
                held: total,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::bank::{Account, AccountData, MintState, TokenAccountState};
    use escrowflow_types::program::TOKEN_PROGRAM_ID;

    fn bank_with(supply: u64, holdings: &[u64]) -> (Bank, Address) {
        let mut bank = Bank::default();
        let mint = Address::new_unique();
        bank.create_account(
            mint,
            Account {
                lamports: 0,
                owner: TOKEN_PROGRAM_ID,
                data: AccountData::Mint(MintState {
                    decimals: 6,
                    mint_authority: Address::new_unique(),
                    supply,
                }),
            },
        )
        .unwrap();
        for amount in holdings {
            bank.create_account(
                Address::new_unique(),
                Account {
                    lamports: 0,
                    owner: TOKEN_PROGRAM_ID,
                    data: AccountData::Token(TokenAccountState {
                        mint,
                        owner: Address::new_unique(),
                        amount: *amount,
                    }),
                },
            )
            .unwrap();
        }
        (bank, mint)
    }

    #[test]
    fn balanced_supply_passes() {
        let (bank, _) = bank_with(300, &[100, 150, 50]);
        assert!(verify(&bank).is_ok());
    }

    #[test]
    fn unbalanced_supply_names_mint() {
        let (bank, mint) = bank_with(300, &[100, 150]);
        let err = verify(&bank).unwrap_err();
        assert_eq!(err.mint, mint);
        assert_eq!(err.held, 250);
    }

    #[test]
    fn transfers_preserve_supply() {
        let (mut bank, _) = bank_with(200, &[]);
        let mint = *bank.mints().next().unwrap().0;
        let (a, b) = (Address::new_unique(), Address::new_unique());
        for (addr, amount) in [(a, 200), (b, 0)] {
            bank.create_account(
                addr,
                Account {
                    lamports: 0,
                    owner: TOKEN_PROGRAM_ID,
                    data: AccountData::Token(TokenAccountState {
                        mint,
                        owner: Address::new_unique(),
                        amount,
                    }),
                },
            )
            .unwrap();
        }
        bank.transfer_tokens(&a, &b, 75).unwrap();
        assert!(verify(&bank).is_ok());
    }
}
