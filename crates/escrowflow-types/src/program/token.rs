//! Fungible-asset program and associated-account program instructions.

use crate::{AccountMeta, Address, Instruction, InstructionError};

use super::{
    ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, read_address, read_u64,
};

// ---------------------------------------------------------------------------
// Token program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInstruction {
    /// Initialize an allocated account as an asset class.
    InitializeMint2 {
        decimals: u8,
        mint_authority: Address,
        freeze_authority: Option<Address>,
    },
    /// Create `amount` new units into a holding account.
    MintTo { amount: u64 },
}

impl TokenInstruction {
    const MINT_TO: u8 = 7;
    const INITIALIZE_MINT2: u8 = 20;

    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                let mut data = Vec::with_capacity(67);
                data.push(Self::INITIALIZE_MINT2);
                data.push(*decimals);
                data.extend_from_slice(mint_authority.as_bytes());
                match freeze_authority {
                    Some(a) => {
                        data.push(1);
                        data.extend_from_slice(a.as_bytes());
                    }
                    None => data.push(0),
                }
                data
            }
            Self::MintTo { amount } => {
                let mut data = Vec::with_capacity(9);
                data.push(Self::MINT_TO);
                data.extend_from_slice(&amount.to_le_bytes());
                data
            }
        }
    }

    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] on an unknown tag
    /// or truncated payload.
    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        let bad = || InstructionError::InvalidInstructionData;
        let (&tag, rest) = data.split_first().ok_or_else(bad)?;
        match tag {
            Self::INITIALIZE_MINT2 => {
                let decimals = *rest.first().ok_or_else(bad)?;
                let mint_authority = read_address(rest, 1).ok_or_else(bad)?;
                let freeze_authority = match rest.get(33) {
                    Some(0) => None,
                    Some(1) => Some(read_address(rest, 34).ok_or_else(bad)?),
                    _ => return Err(bad()),
                };
                Ok(Self::InitializeMint2 {
                    decimals,
                    mint_authority,
                    freeze_authority,
                })
            }
            Self::MINT_TO => Ok(Self::MintTo {
                amount: read_u64(rest, 0).ok_or_else(bad)?,
            }),
            _ => Err(bad()),
        }
    }
}

/// Accounts: `[mint (writable)]`.
#[must_use]
pub fn initialize_mint2(
    mint: Address,
    decimals: u8,
    mint_authority: Address,
    freeze_authority: Option<Address>,
) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(mint, false)],
        data: TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority,
            freeze_authority,
        }
        .pack(),
    }
}

/// Accounts: `[mint (writable), destination (writable), authority (signer)]`.
#[must_use]
pub fn mint_to(
    mint: Address,
    destination: Address,
    authority: Address,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(mint, false),
            AccountMeta::writable(destination, false),
            AccountMeta::readonly(authority, true),
        ],
        data: TokenInstruction::MintTo { amount }.pack(),
    }
}

// ---------------------------------------------------------------------------
// Associated-account program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedAccountInstruction {
    /// Fails if the account already exists.
    Create,
    /// No-op if the account already exists with the right owner and asset.
    CreateIdempotent,
}

impl AssociatedAccountInstruction {
    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] on an unknown tag.
    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        match data.first() {
            None | Some(0) => Ok(Self::Create),
            Some(1) => Ok(Self::CreateIdempotent),
            Some(_) => Err(InstructionError::InvalidInstructionData),
        }
    }
}

/// Accounts: `[payer (signer, writable), associated (writable), owner, mint,
/// system program, token program]`.
#[must_use]
pub fn create_associated_account_idempotent(
    payer: Address,
    associated: Address,
    owner: Address,
    mint: Address,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(payer, true),
            AccountMeta::writable(associated, false),
            AccountMeta::readonly(owner, false),
            AccountMeta::readonly(mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![1],
    }
}
