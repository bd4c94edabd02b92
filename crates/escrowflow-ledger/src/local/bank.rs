//! Account store of the local ledger.
//!
//! Holds lamport balances, asset classes (mints), custody accounts and escrow
//! records. Transactions execute against a clone and are committed by
//! replacing the store, so a failed transaction leaves nothing behind.

use std::collections::HashMap;

use escrowflow_types::{Address, EscrowRecord, InstructionError, constants};

/// Lamports an account of `size` bytes must hold to be rent exempt.
#[must_use]
pub fn rent_exempt_minimum(size: u64) -> u64 {
    (size + constants::ACCOUNT_STORAGE_OVERHEAD)
        * constants::RENT_LAMPORTS_PER_BYTE_YEAR
        * constants::RENT_EXEMPTION_THRESHOLD_YEARS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MintState {
    pub decimals: u8,
    pub mint_authority: Address,
    pub supply: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenAccountState {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AccountData {
    /// Allocated by the system program, not yet claimed by its owner program.
    Uninitialized { space: u64 },
    Mint(MintState),
    Token(TokenAccountState),
    Escrow(EscrowRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Account {
    pub lamports: u64,
    /// Program that owns the account's data.
    pub owner: Address,
    pub data: AccountData,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Bank {
    accounts: HashMap<Address, Account>,
    /// Lamports of system-owned wallets without data.
    wallets: HashMap<Address, u64>,
}

impl Bank {
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address) || self.wallets.get(address).is_some_and(|l| *l > 0)
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    pub fn create_account(
        &mut self,
        address: Address,
        account: Account,
    ) -> Result<(), InstructionError> {
        if self.contains(&address) {
            return Err(InstructionError::AccountAlreadyInUse(address));
        }
        self.accounts.insert(address, account);
        Ok(())
    }

    pub fn lamports(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|a| a.lamports)
            .or_else(|| self.wallets.get(address).copied())
            .unwrap_or(0)
    }

    pub fn credit_lamports(&mut self, address: Address, lamports: u64) {
        if let Some(account) = self.accounts.get_mut(&address) {
            account.lamports = account.lamports.saturating_add(lamports);
        } else {
            let balance = self.wallets.entry(address).or_default();
            *balance = balance.saturating_add(lamports);
        }
    }

    pub fn debit_lamports(
        &mut self,
        address: &Address,
        lamports: u64,
    ) -> Result<(), InstructionError> {
        let balance = match self.accounts.get_mut(address) {
            Some(account) => &mut account.lamports,
            None => self
                .wallets
                .get_mut(address)
                .ok_or(InstructionError::InsufficientFunds)?,
        };
        *balance = balance
            .checked_sub(lamports)
            .ok_or(InstructionError::InsufficientFunds)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Typed views
    // -----------------------------------------------------------------

    pub fn mint(&self, address: &Address) -> Result<&MintState, InstructionError> {
        match self.accounts.get(address).map(|a| &a.data) {
            Some(AccountData::Mint(mint)) => Ok(mint),
            Some(_) => Err(InstructionError::InvalidAccountData(*address)),
            None => Err(InstructionError::AccountNotFound(*address)),
        }
    }

    pub fn mint_mut(&mut self, address: &Address) -> Result<&mut MintState, InstructionError> {
        match self.accounts.get_mut(address).map(|a| &mut a.data) {
            Some(AccountData::Mint(mint)) => Ok(mint),
            Some(_) => Err(InstructionError::InvalidAccountData(*address)),
            None => Err(InstructionError::AccountNotFound(*address)),
        }
    }

    pub fn token_account(&self, address: &Address) -> Result<&TokenAccountState, InstructionError> {
        match self.accounts.get(address).map(|a| &a.data) {
            Some(AccountData::Token(token)) => Ok(token),
            Some(_) => Err(InstructionError::InvalidAccountData(*address)),
            None => Err(InstructionError::AccountNotFound(*address)),
        }
    }

    pub fn token_account_mut(
        &mut self,
        address: &Address,
    ) -> Result<&mut TokenAccountState, InstructionError> {
        match self.accounts.get_mut(address).map(|a| &mut a.data) {
            Some(AccountData::Token(token)) => Ok(token),
            Some(_) => Err(InstructionError::InvalidAccountData(*address)),
            None => Err(InstructionError::AccountNotFound(*address)),
        }
    }

    pub fn escrow(&self, address: &Address) -> Option<&EscrowRecord> {
        match self.accounts.get(address).map(|a| &a.data) {
            Some(AccountData::Escrow(record)) => Some(record),
            _ => None,
        }
    }

    pub fn escrow_mut(&mut self, address: &Address) -> Option<&mut EscrowRecord> {
        match self.accounts.get_mut(address).map(|a| &mut a.data) {
            Some(AccountData::Escrow(record)) => Some(record),
            _ => None,
        }
    }

    /// Move `amount` units between two custody accounts of the same asset.
    /// Atomic: on error neither side changes.
    pub fn transfer_tokens(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let source = *self.token_account(from)?;
        let destination = *self.token_account(to)?;
        if source.mint != destination.mint {
            return Err(InstructionError::InvalidAccountData(*to));
        }
        if source.amount < amount {
            return Err(InstructionError::InsufficientFunds);
        }
        let credited = destination
            .amount
            .checked_add(amount)
            .ok_or(InstructionError::InvalidAccountData(*to))?;
        if from == to {
            return Ok(());
        }
        self.token_account_mut(from)?.amount = source.amount - amount;
        self.token_account_mut(to)?.amount = credited;
        Ok(())
    }

    pub fn mints(&self) -> impl Iterator<Item = (&Address, &MintState)> {
        self.accounts.iter().filter_map(|(addr, a)| match &a.data {
            AccountData::Mint(mint) => Some((addr, mint)),
            _ => None,
        })
    }

    pub fn token_accounts(&self) -> impl Iterator<Item = (&Address, &TokenAccountState)> {
        self.accounts.iter().filter_map(|(addr, a)| match &a.data {
            AccountData::Token(token) => Some((addr, token)),
            _ => None,
        })
    }
}
