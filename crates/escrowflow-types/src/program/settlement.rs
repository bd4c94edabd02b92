//! # Settlement program interface
//!
//! Four instructions drive one escrow record through its lifecycle. Each has
//! a fixed account list; instruction data is an 8-byte discriminator
//! (`sha256("global:<name>")[..8]`) followed by little-endian arguments.
//!
//! - `initialize(escrow id, maker amount, taker amount)`: escrow, maker
//!   (signer), taker, maker asset, taker asset, escrow maker custody, escrow
//!   taker custody, system, token, associated
//! - `deposit_maker`: escrow, maker (signer), maker source, escrow maker
//!   custody, maker asset, token
//! - `deposit_taker`: escrow, taker (signer), taker source, escrow taker
//!   custody, taker asset, token
//! - `execute`: escrow, maker (signer), maker receive, taker receive, escrow
//!   maker custody, escrow taker custody, token

use sha2::{Digest, Sha256};

use crate::{AccountMeta, Address, EscrowId, FlowStep, Instruction, InstructionError};

use super::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, read_u64};

/// Program error codes, reported as [`InstructionError::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SettlementErrorCode {
    InvalidAmount = 6000,
    InvalidState = 6001,
    Unauthorized = 6002,
    InvalidEscrowAddress = 6003,
    AssetMismatch = 6004,
}

impl SettlementErrorCode {
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            6000 => Some(Self::InvalidAmount),
            6001 => Some(Self::InvalidState),
            6002 => Some(Self::Unauthorized),
            6003 => Some(Self::InvalidEscrowAddress),
            6004 => Some(Self::AssetMismatch),
            _ => None,
        }
    }
}

impl From<SettlementErrorCode> for InstructionError {
    fn from(code: SettlementErrorCode) -> Self {
        Self::Custom(code.code())
    }
}

/// 8-byte instruction discriminator.
#[must_use]
pub fn discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:");
    hasher.update(name.as_bytes());
    let hash = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementInstruction {
    Initialize {
        escrow_id: EscrowId,
        maker_amount: u64,
        taker_amount: u64,
    },
    DepositMaker,
    DepositTaker,
    Execute,
}

impl SettlementInstruction {
    fn name(self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::DepositMaker => "deposit_maker",
            Self::DepositTaker => "deposit_taker",
            Self::Execute => "execute",
        }
    }

    /// The escrow step this instruction implements.
    #[must_use]
    pub fn step(self) -> FlowStep {
        match self {
            Self::Initialize { .. } => FlowStep::Initialize,
            Self::DepositMaker => FlowStep::DepositMaker,
            Self::DepositTaker => FlowStep::DepositTaker,
            Self::Execute => FlowStep::Execute,
        }
    }

    #[must_use]
    pub fn pack(self) -> Vec<u8> {
        let mut data = discriminator(self.name()).to_vec();
        if let Self::Initialize {
            escrow_id,
            maker_amount,
            taker_amount,
        } = self
        {
            data.extend_from_slice(&escrow_id.to_le_bytes());
            data.extend_from_slice(&maker_amount.to_le_bytes());
            data.extend_from_slice(&taker_amount.to_le_bytes());
        }
        data
    }

    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] on an unknown
    /// discriminator or truncated arguments.
    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        let bad = || InstructionError::InvalidInstructionData;
        let disc: [u8; 8] = data.get(..8).and_then(|d| d.try_into().ok()).ok_or_else(bad)?;
        if disc == discriminator("initialize") {
            Ok(Self::Initialize {
                escrow_id: EscrowId(read_u64(data, 8).ok_or_else(bad)?),
                maker_amount: read_u64(data, 16).ok_or_else(bad)?,
                taker_amount: read_u64(data, 24).ok_or_else(bad)?,
            })
        } else if disc == discriminator("deposit_maker") {
            Ok(Self::DepositMaker)
        } else if disc == discriminator("deposit_taker") {
            Ok(Self::DepositTaker)
        } else if disc == discriminator("execute") {
            Ok(Self::Execute)
        } else {
            Err(bad())
        }
    }
}

fn account(ix: &Instruction, index: usize) -> Result<Address, InstructionError> {
    ix.account(index).ok_or(InstructionError::InvalidInstructionData)
}

// ---------------------------------------------------------------------------
// initialize
// ---------------------------------------------------------------------------

/// Accounts of `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeAccounts {
    pub escrow: Address,
    pub maker: Address,
    pub taker: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    pub escrow_maker_custody: Address,
    pub escrow_taker_custody: Address,
}

impl InitializeAccounts {
    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] if accounts are missing.
    pub fn from_instruction(ix: &Instruction) -> Result<Self, InstructionError> {
        Ok(Self {
            escrow: account(ix, 0)?,
            maker: account(ix, 1)?,
            taker: account(ix, 2)?,
            maker_asset: account(ix, 3)?,
            taker_asset: account(ix, 4)?,
            escrow_maker_custody: account(ix, 5)?,
            escrow_taker_custody: account(ix, 6)?,
        })
    }
}

#[must_use]
pub fn initialize(
    program_id: Address,
    accounts: &InitializeAccounts,
    escrow_id: EscrowId,
    maker_amount: u64,
    taker_amount: u64,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::writable(accounts.escrow, false),
            AccountMeta::writable(accounts.maker, true),
            AccountMeta::readonly(accounts.taker, false),
            AccountMeta::readonly(accounts.maker_asset, false),
            AccountMeta::readonly(accounts.taker_asset, false),
            AccountMeta::writable(accounts.escrow_maker_custody, false),
            AccountMeta::writable(accounts.escrow_taker_custody, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        ],
        data: SettlementInstruction::Initialize {
            escrow_id,
            maker_amount,
            taker_amount,
        }
        .pack(),
    }
}

// ---------------------------------------------------------------------------
// deposit_maker / deposit_taker
// ---------------------------------------------------------------------------

/// Accounts of either deposit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositAccounts {
    pub escrow: Address,
    /// The depositing party; must sign.
    pub depositor: Address,
    /// The party's own holding account for `asset`.
    pub source: Address,
    /// The escrow-owned custody account for `asset`.
    pub escrow_custody: Address,
    pub asset: Address,
}

impl DepositAccounts {
    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] if accounts are missing.
    pub fn from_instruction(ix: &Instruction) -> Result<Self, InstructionError> {
        Ok(Self {
            escrow: account(ix, 0)?,
            depositor: account(ix, 1)?,
            source: account(ix, 2)?,
            escrow_custody: account(ix, 3)?,
            asset: account(ix, 4)?,
        })
    }

    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::writable(self.escrow, false),
            AccountMeta::readonly(self.depositor, true),
            AccountMeta::writable(self.source, false),
            AccountMeta::writable(self.escrow_custody, false),
            AccountMeta::readonly(self.asset, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ]
    }
}

#[must_use]
pub fn deposit_maker(program_id: Address, accounts: &DepositAccounts) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.metas(),
        data: SettlementInstruction::DepositMaker.pack(),
    }
}

#[must_use]
pub fn deposit_taker(program_id: Address, accounts: &DepositAccounts) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.metas(),
        data: SettlementInstruction::DepositTaker.pack(),
    }
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

/// Accounts of `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteAccounts {
    pub escrow: Address,
    pub maker: Address,
    /// Maker's holding account for the taker asset.
    pub maker_receive: Address,
    /// Taker's holding account for the maker asset.
    pub taker_receive: Address,
    pub escrow_maker_custody: Address,
    pub escrow_taker_custody: Address,
}

impl ExecuteAccounts {
    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] if accounts are missing.
    pub fn from_instruction(ix: &Instruction) -> Result<Self, InstructionError> {
        Ok(Self {
            escrow: account(ix, 0)?,
            maker: account(ix, 1)?,
            maker_receive: account(ix, 2)?,
            taker_receive: account(ix, 3)?,
            escrow_maker_custody: account(ix, 4)?,
            escrow_taker_custody: account(ix, 5)?,
        })
    }
}

#[must_use]
pub fn execute(program_id: Address, accounts: &ExecuteAccounts) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::writable(accounts.escrow, false),
            AccountMeta::readonly(accounts.maker, true),
            AccountMeta::writable(accounts.maker_receive, false),
            AccountMeta::writable(accounts.taker_receive, false),
            AccountMeta::writable(accounts.escrow_maker_custody, false),
            AccountMeta::writable(accounts.escrow_taker_custody, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: SettlementInstruction::Execute.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 32])
    }

    #[test]
    fn discriminators_are_distinct() {
        let names = ["initialize", "deposit_maker", "deposit_taker", "execute"];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(discriminator(a), discriminator(b));
            }
        }
    }

    #[test]
    fn initialize_args_decode() {
        let accounts = InitializeAccounts {
            escrow: addr(1),
            maker: addr(2),
            taker: addr(3),
            maker_asset: addr(4),
            taker_asset: addr(5),
            escrow_maker_custody: addr(6),
            escrow_taker_custody: addr(7),
        };
        let ix = initialize(addr(9), &accounts, EscrowId(12345), 100, 250);
        assert_eq!(
            SettlementInstruction::unpack(&ix.data).unwrap(),
            SettlementInstruction::Initialize {
                escrow_id: EscrowId(12345),
                maker_amount: 100,
                taker_amount: 250,
            }
        );
        assert_eq!(InitializeAccounts::from_instruction(&ix).unwrap(), accounts);
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn deposit_and_execute_decode() {
        let deposit = DepositAccounts {
            escrow: addr(1),
            depositor: addr(2),
            source: addr(3),
            escrow_custody: addr(4),
            asset: addr(5),
        };
        let ix = deposit_taker(addr(9), &deposit);
        assert_eq!(
            SettlementInstruction::unpack(&ix.data).unwrap(),
            SettlementInstruction::DepositTaker
        );
        assert_eq!(DepositAccounts::from_instruction(&ix).unwrap(), deposit);

        let exec = ExecuteAccounts {
            escrow: addr(1),
            maker: addr(2),
            maker_receive: addr(3),
            taker_receive: addr(4),
            escrow_maker_custody: addr(5),
            escrow_taker_custody: addr(6),
        };
        let ix = execute(addr(9), &exec);
        assert_eq!(SettlementInstruction::unpack(&ix.data).unwrap().step(), FlowStep::Execute);
        assert_eq!(ExecuteAccounts::from_instruction(&ix).unwrap(), exec);
    }

    #[test]
    fn error_codes_roundtrip() {
        for code in [
            SettlementErrorCode::InvalidAmount,
            SettlementErrorCode::InvalidState,
            SettlementErrorCode::Unauthorized,
            SettlementErrorCode::InvalidEscrowAddress,
            SettlementErrorCode::AssetMismatch,
        ] {
            assert_eq!(SettlementErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(SettlementErrorCode::from_code(1), None);
    }

    #[test]
    fn unknown_discriminator_rejected() {
        assert!(SettlementInstruction::unpack(&[0u8; 8]).is_err());
        assert!(SettlementInstruction::unpack(&[1, 2]).is_err());
    }
}
