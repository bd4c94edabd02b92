//! Error types for EscrowFlow.
//!
//! All orchestrator errors use the `EF_ERR_` prefix convention and all
//! ledger-connection errors the `LD_ERR_` prefix, for easy grepping in logs.
//! Orchestrator codes are grouped by subsystem:
//! - 1xx: Request / connection errors
//! - 2xx: Concurrency errors
//! - 3xx: Address derivation errors
//! - 4xx: Provisioning errors
//! - 5xx: Escrow step errors
//! - 9xx: General / internal errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Address, FlowStep, Signature};

// ---------------------------------------------------------------------------
// On-ledger failure payloads
// ---------------------------------------------------------------------------

/// Why a single instruction failed inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionError {
    /// Program-specific error code (settlement program codes start at 6000).
    Custom(u32),
    /// Tried to create an account at an address that is already in use.
    AccountAlreadyInUse(Address),
    /// A required account does not exist.
    AccountNotFound(Address),
    /// Token balance or lamports too low for the requested movement.
    InsufficientFunds,
    /// An account that must sign did not.
    MissingRequiredSignature(Address),
    /// Instruction data could not be decoded.
    InvalidInstructionData,
    /// Account data did not have the expected shape or owner.
    InvalidAccountData(Address),
    /// Derivation seeds do not produce the supplied address.
    InvalidSeeds,
    /// No program is deployed at this identity.
    UnknownProgram(Address),
}

impl fmt::Display for InstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(code) => write!(f, "custom program error: {code:#x} ({code})"),
            Self::AccountAlreadyInUse(a) => write!(f, "account {a} already in use"),
            Self::AccountNotFound(a) => write!(f, "account {a} not found"),
            Self::InsufficientFunds => write!(f, "insufficient funds"),
            Self::MissingRequiredSignature(a) => write!(f, "missing required signature of {a}"),
            Self::InvalidInstructionData => write!(f, "invalid instruction data"),
            Self::InvalidAccountData(a) => write!(f, "invalid account data for {a}"),
            Self::InvalidSeeds => write!(f, "invalid derivation seeds"),
            Self::UnknownProgram(p) => write!(f, "unknown program {p}"),
        }
    }
}

/// The error payload a confirmation report (or preflight) can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionError {
    /// Instruction `index` failed; the whole transaction rolled back.
    InstructionError { index: u8, error: InstructionError },
    /// This signature has already been processed.
    AlreadyProcessed,
    /// The referenced blockhash is unknown or expired.
    BlockhashNotFound,
    /// Fee payer cannot cover the signature fee.
    InsufficientFundsForFee,
    /// A signature does not verify against the message.
    SignatureFailure,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstructionError { index, error } => {
                write!(f, "instruction {index} failed: {error}")
            }
            Self::AlreadyProcessed => write!(f, "transaction already processed"),
            Self::BlockhashNotFound => write!(f, "blockhash not found"),
            Self::InsufficientFundsForFee => write!(f, "insufficient funds for fee"),
            Self::SignatureFailure => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for TransactionError {}

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Failures reported by a ledger connection.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The connection could not reach the ledger.
    #[error("LD_ERR_100: Ledger unavailable: {0}")]
    Unavailable(String),

    /// Preflight simulation rejected the transaction; nothing was committed.
    #[error("LD_ERR_200: Preflight rejected transaction: {error}")]
    PreflightFailed {
        error: TransactionError,
        logs: Vec<String>,
    },

    /// The transaction was rejected before simulation.
    #[error("LD_ERR_201: Transaction rejected: {0}")]
    Rejected(TransactionError),

    /// The blockhash's validity window passed before the signature landed.
    #[error(
        "LD_ERR_300: Block height exceeded for signature {signature:?} \
         (last valid {last_valid_block_height})"
    )]
    BlockHeightExceeded {
        signature: Signature,
        last_valid_block_height: u64,
    },

    /// The requested account does not exist.
    #[error("LD_ERR_400: Account not found: {0}")]
    AccountNotFound(Address),

    /// The account exists but is not a balance-holding account.
    #[error("LD_ERR_401: Account {0} is not a custody account")]
    NotATokenAccount(Address),
}

impl LedgerError {
    /// Program logs attached to a preflight rejection, if any.
    #[must_use]
    pub fn logs(&self) -> &[String] {
        match self {
            Self::PreflightFailed { logs, .. } => logs,
            _ => &[],
        }
    }
}

/// `Result` alias for ledger connection calls.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// EscrowFlowError
// ---------------------------------------------------------------------------

/// Central error enum for all EscrowFlow operations.
#[derive(Debug, Error)]
pub enum EscrowFlowError {
    // =================================================================
    // Request / Connection Errors (1xx)
    // =================================================================
    /// No signer is available for one of the parties.
    #[error("EF_ERR_100: Not connected: no signer available for the {party}")]
    NotConnected { party: &'static str },

    /// The request was rejected before any side effect.
    #[error("EF_ERR_101: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A transaction names a required signer that was not supplied.
    #[error("EF_ERR_102: Missing signer for {0}")]
    MissingSigner(Address),

    // =================================================================
    // Concurrency Errors (2xx)
    // =================================================================
    /// Another flow is already running on this orchestrator.
    #[error("EF_ERR_200: Escrow flow already in progress")]
    AlreadyInProgress,

    // =================================================================
    // Derivation Errors (3xx)
    // =================================================================
    /// A custody account was requested for an off-curve owner without
    /// allowing it.
    #[error("EF_ERR_300: Owner {0} is off curve")]
    OwnerOffCurve(Address),

    /// No bump in 255..=0 yields an off-curve address.
    #[error("EF_ERR_301: No viable bump for seeds under program {0}")]
    NoViableBump(Address),

    /// Seeds exceed the allowed count or length.
    #[error("EF_ERR_302: Invalid seeds: {reason}")]
    InvalidSeeds { reason: String },

    // =================================================================
    // Provisioning Errors (4xx)
    // =================================================================
    /// Creating or funding an asset or holding account failed.
    #[error("EF_ERR_400: Provisioning failed for {subject}: {source}")]
    ProvisioningFailed {
        subject: String,
        #[source]
        source: Box<EscrowFlowError>,
    },

    // =================================================================
    // Escrow Step Errors (5xx)
    // =================================================================
    /// The ledger refused the step's transaction; nothing was committed.
    #[error("EF_ERR_500: Step {step} rejected: {source}")]
    SubmissionRejected {
        step: FlowStep,
        #[source]
        source: LedgerError,
    },

    /// The step was submitted but its outcome is unknown after the bounded wait.
    #[error("EF_ERR_501: Step {step} confirmation timed out (signature {signature:?})")]
    ConfirmationTimeout { step: FlowStep, signature: Signature },

    /// The step landed but the program signaled failure.
    #[error("EF_ERR_502: Step {step} failed on-ledger (signature {signature:?}): {reason}")]
    ConfirmationFailed {
        step: FlowStep,
        signature: Signature,
        reason: TransactionError,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("EF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("EF_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range values).
    #[error("EF_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("EF_ERR_903: I/O error: {0}")]
    Io(String),
}

impl EscrowFlowError {
    /// The escrow step this error is tagged with, if any.
    #[must_use]
    pub fn step(&self) -> Option<FlowStep> {
        match self {
            Self::SubmissionRejected { step, .. }
            | Self::ConfirmationTimeout { step, .. }
            | Self::ConfirmationFailed { step, .. } => Some(*step),
            Self::ProvisioningFailed { source, .. } => source.step(),
            _ => None,
        }
    }

    /// Whether funds may be held by the escrow authority after this failure.
    ///
    /// True once the maker deposit may have landed: any failure of
    /// deposit-taker or execute, or an unknown outcome of deposit-maker.
    #[must_use]
    pub fn requires_operator_intervention(&self) -> bool {
        match self {
            Self::ConfirmationTimeout { step, .. } => {
                matches!(
                    step,
                    FlowStep::DepositMaker | FlowStep::DepositTaker | FlowStep::Execute
                )
            }
            Self::SubmissionRejected { step, .. } | Self::ConfirmationFailed { step, .. } => {
                matches!(step, FlowStep::DepositTaker | FlowStep::Execute)
            }
            _ => false,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EscrowFlowError>;

impl From<std::io::Error> for EscrowFlowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EscrowFlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = EscrowFlowError::AlreadyInProgress;
        let msg = format!("{err}");
        assert!(msg.starts_with("EF_ERR_200"), "Got: {msg}");
    }

    #[test]
    fn timeout_names_step() {
        let err = EscrowFlowError::ConfirmationTimeout {
            step: FlowStep::DepositTaker,
            signature: Signature([1u8; 64]),
        };
        let msg = format!("{err}");
        assert!(msg.contains("EF_ERR_501"));
        assert!(msg.contains("deposit-taker"));
        assert_eq!(err.step(), Some(FlowStep::DepositTaker));
    }

    #[test]
    fn confirmation_failed_carries_program_code() {
        let err = EscrowFlowError::ConfirmationFailed {
            step: FlowStep::Execute,
            signature: Signature([2u8; 64]),
            reason: TransactionError::InstructionError {
                index: 0,
                error: InstructionError::Custom(6001),
            },
        };
        let msg = format!("{err}");
        assert!(msg.contains("6001"), "Got: {msg}");
    }

    #[test]
    fn provisioning_failure_inherits_step() {
        let inner = EscrowFlowError::SubmissionRejected {
            step: FlowStep::CreateAssets,
            source: LedgerError::Unavailable("down".into()),
        };
        let err = EscrowFlowError::ProvisioningFailed {
            subject: "asset pair".into(),
            source: Box::new(inner),
        };
        assert_eq!(err.step(), Some(FlowStep::CreateAssets));
        assert!(!err.requires_operator_intervention());
    }

    #[test]
    fn intervention_only_after_maker_funds_may_be_locked() {
        let sig = Signature([0u8; 64]);
        let rejected = |step| EscrowFlowError::SubmissionRejected {
            step,
            source: LedgerError::Unavailable("x".into()),
        };
        assert!(!rejected(FlowStep::Initialize).requires_operator_intervention());
        assert!(!rejected(FlowStep::DepositMaker).requires_operator_intervention());
        assert!(rejected(FlowStep::DepositTaker).requires_operator_intervention());
        assert!(rejected(FlowStep::Execute).requires_operator_intervention());

        let timeout = EscrowFlowError::ConfirmationTimeout {
            step: FlowStep::DepositMaker,
            signature: sig,
        };
        assert!(timeout.requires_operator_intervention());
        assert!(!EscrowFlowError::AlreadyInProgress.requires_operator_intervention());
    }

    #[test]
    fn ledger_errors_have_ld_prefix() {
        let errors = vec![
            LedgerError::Unavailable("x".into()),
            LedgerError::Rejected(TransactionError::AlreadyProcessed),
            LedgerError::AccountNotFound(Address::new([0u8; 32])),
            LedgerError::PreflightFailed {
                error: TransactionError::BlockhashNotFound,
                logs: vec!["log".into()],
            },
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(msg.starts_with("LD_ERR_"), "Missing LD_ERR_ prefix: {msg}");
        }
    }

    #[test]
    fn preflight_logs_exposed() {
        let err = LedgerError::PreflightFailed {
            error: TransactionError::BlockhashNotFound,
            logs: vec!["Program log: boom".into()],
        };
        assert_eq!(err.logs(), ["Program log: boom".to_string()]);
        assert!(LedgerError::Unavailable("x".into()).logs().is_empty());
    }
}
