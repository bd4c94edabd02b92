//! Transactions, instructions and the request/response shapes exchanged with
//! a ledger connection.
//!
//! A transaction is signed over its canonical message bytes; the fee payer's
//! signature comes first and doubles as the transaction's ledger identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Address, Blockhash, EscrowFlowError, Result, Signature, TransactionError, TransactionSigner,
    signer::verify_signature,
};

// ---------------------------------------------------------------------------
// Commitment / options
// ---------------------------------------------------------------------------

/// How settled a ledger observation must be before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Options for a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Skip simulation; failures then surface only in the confirmation report.
    pub skip_preflight: bool,
    pub preflight_commitment: CommitmentLevel,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: CommitmentLevel::Confirmed,
        }
    }
}

/// Result of `get_latest_blockhash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    /// Last block height at which a transaction using `blockhash` can land.
    pub last_valid_block_height: u64,
}

/// What to wait for: the signature plus the validity window it was built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub signature: Signature,
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

/// Terminal status of a landed transaction. A present `err` means the
/// transaction was committed as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationReport {
    pub slot: u64,
    pub err: Option<TransactionError>,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// An account referenced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    #[must_use]
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    #[must_use]
    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// One program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// Address of the account at `index`, if supplied.
    #[must_use]
    pub fn account(&self, index: usize) -> Option<Address> {
        self.accounts.get(index).map(|m| m.address)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An ordered list of instructions executed atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub fee_payer: Address,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<Instruction>,
    /// Signatures in [`Transaction::required_signers`] order.
    pub signatures: Vec<Signature>,
}

impl Transaction {
    #[must_use]
    pub fn new_unsigned(
        fee_payer: Address,
        instructions: Vec<Instruction>,
        recent_blockhash: Blockhash,
    ) -> Self {
        Self {
            fee_payer,
            recent_blockhash,
            instructions,
            signatures: Vec::new(),
        }
    }

    /// Fee payer first, then every signer account in instruction order,
    /// without duplicates.
    #[must_use]
    pub fn required_signers(&self) -> Vec<Address> {
        let mut out = vec![self.fee_payer];
        for meta in self.instructions.iter().flat_map(|ix| &ix.accounts) {
            if meta.is_signer && !out.contains(&meta.address) {
                out.push(meta.address);
            }
        }
        out
    }

    /// Canonical bytes covered by every signature.
    ///
    /// Format: `"escrowflow:tx:v1:" || fee_payer || blockhash || n_ix ||
    /// (program || n_accounts || (address || flags)* || data_len || data)*`
    #[must_use]
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(128 + self.instructions.len() * 256);
        msg.extend_from_slice(b"escrowflow:tx:v1:");
        msg.extend_from_slice(self.fee_payer.as_bytes());
        msg.extend_from_slice(&self.recent_blockhash.0);
        msg.extend_from_slice(&(self.instructions.len() as u64).to_le_bytes());
        for ix in &self.instructions {
            msg.extend_from_slice(ix.program_id.as_bytes());
            msg.extend_from_slice(&(ix.accounts.len() as u64).to_le_bytes());
            for meta in &ix.accounts {
                msg.extend_from_slice(meta.address.as_bytes());
                msg.push(u8::from(meta.is_signer) | (u8::from(meta.is_writable) << 1));
            }
            msg.extend_from_slice(&(ix.data.len() as u64).to_le_bytes());
            msg.extend_from_slice(&ix.data);
        }
        msg
    }

    /// Sign with the supplied signers, replacing any earlier signatures.
    ///
    /// # Errors
    /// Returns [`EscrowFlowError::MissingSigner`] if a required signer is
    /// not among `signers`.
    pub fn sign(&mut self, signers: &[&dyn TransactionSigner]) -> Result<()> {
        let message = self.message_bytes();
        let mut signatures = Vec::with_capacity(signers.len());
        for required in self.required_signers() {
            let signer = signers
                .iter()
                .find(|s| s.address() == required)
                .ok_or(EscrowFlowError::MissingSigner(required))?;
            signatures.push(signer.sign_message(&message));
        }
        self.signatures = signatures;
        Ok(())
    }

    /// The fee payer's signature, which identifies the transaction.
    #[must_use]
    pub fn signature(&self) -> Option<Signature> {
        self.signatures.first().copied()
    }

    /// Whether every required signer has a valid signature over the message.
    #[must_use]
    pub fn verify_signatures(&self) -> bool {
        let required = self.required_signers();
        if required.len() != self.signatures.len() {
            return false;
        }
        let message = self.message_bytes();
        required
            .iter()
            .zip(&self.signatures)
            .all(|(addr, sig)| verify_signature(addr, &message, sig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;

    fn ix(program: Address, signer: Address, other: Address) -> Instruction {
        Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::writable(signer, true),
                AccountMeta::readonly(other, false),
            ],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn required_signers_dedupes_and_orders() {
        let payer = Keypair::generate();
        let cosigner = Keypair::generate();
        let tx = Transaction::new_unsigned(
            payer.address(),
            vec![
                ix(Address::new([9u8; 32]), cosigner.address(), payer.address()),
                ix(Address::new([9u8; 32]), payer.address(), cosigner.address()),
            ],
            Blockhash([0u8; 32]),
        );
        assert_eq!(
            tx.required_signers(),
            vec![payer.address(), cosigner.address()]
        );
    }

    #[test]
    fn signed_transaction_verifies() {
        let payer = Keypair::generate();
        let cosigner = Keypair::generate();
        let mut tx = Transaction::new_unsigned(
            payer.address(),
            vec![ix(Address::new([9u8; 32]), cosigner.address(), Address::new([1u8; 32]))],
            Blockhash([5u8; 32]),
        );
        tx.sign(&[&cosigner, &payer]).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify_signatures());
        assert_eq!(tx.signature(), tx.signatures.first().copied());
    }

    #[test]
    fn tampering_breaks_signatures() {
        let payer = Keypair::generate();
        let mut tx = Transaction::new_unsigned(
            payer.address(),
            vec![ix(Address::new([9u8; 32]), payer.address(), Address::new([1u8; 32]))],
            Blockhash([5u8; 32]),
        );
        tx.sign(&[&payer]).unwrap();
        tx.instructions[0].data.push(0xFF);
        assert!(!tx.verify_signatures());
    }

    #[test]
    fn missing_signer_is_reported() {
        let payer = Keypair::generate();
        let absent = Keypair::generate();
        let mut tx = Transaction::new_unsigned(
            payer.address(),
            vec![ix(Address::new([9u8; 32]), absent.address(), Address::new([1u8; 32]))],
            Blockhash([5u8; 32]),
        );
        let err = tx.sign(&[&payer]).unwrap_err();
        assert!(matches!(err, EscrowFlowError::MissingSigner(a) if a == absent.address()));
        assert!(tx.signatures.is_empty());
    }

    #[test]
    fn different_blockhash_changes_message() {
        let payer = Address::new([1u8; 32]);
        let a = Transaction::new_unsigned(payer, vec![], Blockhash([1u8; 32]));
        let b = Transaction::new_unsigned(payer, vec![], Blockhash([2u8; 32]));
        assert_ne!(a.message_bytes(), b.message_bytes());
    }

    #[test]
    fn commitment_default_is_confirmed() {
        assert_eq!(CommitmentLevel::default(), CommitmentLevel::Confirmed);
        assert_eq!(
            serde_json::to_string(&CommitmentLevel::Finalized).unwrap(),
            "\"finalized\""
        );
    }
}
