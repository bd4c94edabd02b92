//! System program instructions.

use crate::{AccountMeta, Address, Instruction, InstructionError};

use super::{SYSTEM_PROGRAM_ID, read_address, read_u64};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemInstruction {
    /// Allocate `space` bytes at a new address, fund it with `lamports` and
    /// assign it to `owner`. Both the funder and the new account sign.
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Address,
    },
}

impl SystemInstruction {
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                let mut data = Vec::with_capacity(52);
                data.extend_from_slice(&0u32.to_le_bytes());
                data.extend_from_slice(&lamports.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(owner.as_bytes());
                data
            }
        }
    }

    /// # Errors
    /// Returns [`InstructionError::InvalidInstructionData`] on an unknown tag
    /// or truncated payload.
    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        let tag = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or(InstructionError::InvalidInstructionData)?;
        match tag {
            0 => Ok(Self::CreateAccount {
                lamports: read_u64(data, 4).ok_or(InstructionError::InvalidInstructionData)?,
                space: read_u64(data, 12).ok_or(InstructionError::InvalidInstructionData)?,
                owner: read_address(data, 20).ok_or(InstructionError::InvalidInstructionData)?,
            }),
            _ => Err(InstructionError::InvalidInstructionData),
        }
    }
}

/// Accounts: `[funder (signer, writable), new_account (signer, writable)]`.
#[must_use]
pub fn create_account(
    funder: Address,
    new_account: Address,
    lamports: u64,
    space: u64,
    owner: Address,
) -> Instruction {
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(funder, true),
            AccountMeta::writable(new_account, true),
        ],
        data: SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        }
        .pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_account_decodes() {
        let owner = Address::new([4u8; 32]);
        let ix = create_account(Address::new([1u8; 32]), Address::new([2u8; 32]), 10, 82, owner);
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert!(ix.accounts.iter().all(|m| m.is_signer));
        assert_eq!(
            SystemInstruction::unpack(&ix.data).unwrap(),
            SystemInstruction::CreateAccount {
                lamports: 10,
                space: 82,
                owner
            }
        );
    }

    #[test]
    fn truncated_data_rejected() {
        assert_eq!(
            SystemInstruction::unpack(&[0, 0, 0, 0, 1]),
            Err(InstructionError::InvalidInstructionData)
        );
        assert!(SystemInstruction::unpack(&[9, 0, 0, 0]).is_err());
    }
}
