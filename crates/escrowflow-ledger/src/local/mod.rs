//! # LocalLedger
//!
//! An in-process ledger implementing [`LedgerConnection`] with the system,
//! token, associated-account and settlement programs built in.
//!
//! ## Block model
//!
//! Every `get_latest_blockhash` call produces a new block, so each step of a
//! flow signs against a fresh blockhash. A blockhash stays valid for
//! [`constants::BLOCKHASH_VALIDITY_BLOCKS`] blocks.
//!
//! ## Submission pipeline
//!
//! 1. Signature verification and duplicate check (`AlreadyProcessed`)
//! 2. Blockhash validity (`BlockhashNotFound`)
//! 3. Fee payer can cover `5000 × signatures`
//! 4. Execution against a copy of the bank; with preflight enabled a failure
//!    is returned as [`LedgerError::PreflightFailed`] and nothing lands
//! 5. Commit (or, preflight skipped, land as failed and charge the fee)
//!
//! Injected [`Fault`]s short-circuit the pipeline for matching instruction
//! kinds.
//!
//! ## Retention
//!
//! Signature statuses and the submission log keep the most recent
//! [`HISTORY_CAPACITY`] entries. Confirming an evicted signature reports an
//! expired blockhash.

mod bank;
mod faults;
mod history;
mod processor;
mod settlement;
mod supply;

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use escrowflow_types::{
    Address, Blockhash, CommitmentLevel, ConfirmRequest, ConfirmationReport, EscrowRecord,
    LatestBlockhash, LedgerError, LedgerResult, Signature, SubmitOptions, TokenAmount,
    Transaction, TransactionError, constants, program::DEFAULT_SETTLEMENT_PROGRAM_ID,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::connection::LedgerConnection;

pub use bank::rent_exempt_minimum;
pub use faults::{Fault, InstructionKind};
pub use history::{SubmissionOutcome, SubmissionRecord};
pub use supply::SupplyMismatch;

use bank::Bank;
use faults::FaultPlan;
use history::{ProcessedSignatures, SubmissionLog};

/// Signatures, statuses and submission records retained.
pub const HISTORY_CAPACITY: usize = 65_536;

#[derive(Debug, Clone)]
enum Status {
    Landed(ConfirmationReport),
    /// Landed, but confirmation is withheld.
    Withheld,
    /// Accepted, never landed.
    Expired,
}

struct LedgerState {
    bank: Bank,
    block_height: u64,
    slot: u64,
    /// Recent blockhashes and their last valid block height.
    blockhashes: HashMap<Blockhash, u64>,
    statuses: HashMap<Signature, Status>,
    processed: ProcessedSignatures,
    faults: FaultPlan,
    log: SubmissionLog,
}

impl LedgerState {
    /// Mark `signature` processed and store its status, dropping the status
    /// of whichever signature the cache evicts.
    fn track(&mut self, signature: Signature, status: Status) {
        if let Ok(Some(evicted)) = self.processed.mark(signature) {
            self.statuses.remove(&evicted);
        }
        self.statuses.insert(signature, status);
    }
}

pub struct LocalLedger {
    settlement_program: Address,
    state: Mutex<LedgerState>,
}

impl LocalLedger {
    /// A ledger with the settlement program at its default identity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settlement_program(DEFAULT_SETTLEMENT_PROGRAM_ID)
    }

    #[must_use]
    pub fn with_settlement_program(settlement_program: Address) -> Self {
        Self {
            settlement_program,
            state: Mutex::new(LedgerState {
                bank: Bank::default(),
                block_height: 0,
                slot: 0,
                blockhashes: HashMap::new(),
                statuses: HashMap::new(),
                processed: ProcessedSignatures::new(HISTORY_CAPACITY),
                faults: FaultPlan::default(),
                log: SubmissionLog::new(HISTORY_CAPACITY),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn settlement_program(&self) -> Address {
        self.settlement_program
    }

    // -----------------------------------------------------------------
    // Funding and inspection
    // -----------------------------------------------------------------

    /// Credit lamports to any address.
    pub fn airdrop(&self, address: Address, lamports: u64) {
        self.state().bank.credit_lamports(address, lamports);
        debug!(address = %address.short(), lamports, "airdrop");
    }

    #[must_use]
    pub fn lamports(&self, address: &Address) -> u64 {
        self.state().bank.lamports(address)
    }

    /// Raw balance of a custody account.
    #[must_use]
    pub fn token_balance(&self, account: &Address) -> Option<u64> {
        self.state().bank.token_account(account).ok().map(|t| t.amount)
    }

    /// Owner of a custody account.
    #[must_use]
    pub fn token_owner(&self, account: &Address) -> Option<Address> {
        self.state().bank.token_account(account).ok().map(|t| t.owner)
    }

    #[must_use]
    pub fn mint_supply(&self, mint: &Address) -> Option<u64> {
        self.state().bank.mint(mint).ok().map(|m| m.supply)
    }

    #[must_use]
    pub fn escrow_record(&self, escrow: &Address) -> Option<EscrowRecord> {
        self.state().bank.escrow(escrow).cloned()
    }

    #[must_use]
    pub fn block_height(&self) -> u64 {
        self.state().block_height
    }

    /// Verify `supply == Σ holdings` for every asset class.
    ///
    /// # Errors
    /// The first asset class whose holdings disagree with its supply.
    pub fn check_supply_conservation(&self) -> Result<(), SupplyMismatch> {
        supply::verify(&self.state().bank)
    }

    // -----------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------

    /// Apply `fault` to every transaction containing an instruction of `kind`
    /// until [`LocalLedger::clear_faults`].
    pub fn inject_fault(&self, kind: InstructionKind, fault: Fault) {
        info!(?kind, ?fault, "fault injected");
        self.state().faults.inject(kind, fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    // -----------------------------------------------------------------
    // Submission log
    // -----------------------------------------------------------------

    #[must_use]
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state().log.iter().cloned().collect()
    }

    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.state().log.len()
    }

    /// Whether any transaction containing `kind` reached the node.
    #[must_use]
    pub fn was_submitted(&self, kind: InstructionKind) -> bool {
        self.state().log.iter().any(|r| r.contains(kind))
    }

    // -----------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------

    fn submit(&self, tx: &Transaction, options: SubmitOptions) -> LedgerResult<Signature> {
        let mut state = self.state();
        let kinds: Vec<_> = tx
            .instructions
            .iter()
            .map(|ix| InstructionKind::classify(ix, &self.settlement_program))
            .collect();
        let signature = tx.signature();

        let refuse = |state: &mut LedgerState, error: LedgerError| {
            state.log.push(SubmissionRecord {
                signature,
                recent_blockhash: tx.recent_blockhash,
                kinds: kinds.clone(),
                outcome: SubmissionOutcome::Refused(error.to_string()),
                confirmation_dropped: false,
            });
            warn!(error = %error, "transaction refused");
            Err(error)
        };

        let Some(signature) = signature else {
            return refuse(
                &mut *state,
                LedgerError::Rejected(TransactionError::SignatureFailure),
            );
        };
        if !tx.verify_signatures() {
            return refuse(
                &mut *state,
                LedgerError::Rejected(TransactionError::SignatureFailure),
            );
        }
        if state.processed.contains(&signature) {
            return refuse(
                &mut *state,
                LedgerError::Rejected(TransactionError::AlreadyProcessed),
            );
        }
        let fresh = state
            .blockhashes
            .get(&tx.recent_blockhash)
            .is_some_and(|last_valid| state.block_height <= *last_valid);
        if !fresh {
            return refuse(
                &mut *state,
                LedgerError::Rejected(TransactionError::BlockhashNotFound),
            );
        }

        let fault = state.faults.lookup(&kinds);
        match &fault {
            Some((index, Fault::RejectSubmission)) => {
                return refuse(
                    &mut *state,
                    LedgerError::Unavailable(format!(
                        "node refused instruction {index} ({:?})",
                        kinds.get(*index).copied().flatten()
                    )),
                );
            }
            Some((_, Fault::ExpireBlockhash)) => {
                // Accepted into the queue; it will never land.
                state.track(signature, Status::Expired);
                state.log.push(SubmissionRecord {
                    signature: Some(signature),
                    recent_blockhash: tx.recent_blockhash,
                    kinds,
                    outcome: SubmissionOutcome::Expired,
                    confirmation_dropped: false,
                });
                return Ok(signature);
            }
            _ => {}
        }

        let fee = constants::LAMPORTS_PER_SIGNATURE * tx.signatures.len() as u64;
        let mut charged = state.bank.clone();
        if charged.debit_lamports(&tx.fee_payer, fee).is_err() {
            return refuse(
                &mut *state,
                LedgerError::Rejected(TransactionError::InsufficientFundsForFee),
            );
        }

        let mut working = charged.clone();
        let mut logs = Vec::new();
        let mut result =
            processor::process_transaction(&mut working, tx, self.settlement_program, &mut logs);
        if let Some((index, Fault::FailExecution(error))) = &fault {
            if result.is_ok() {
                logs.push(format!("Program log: injected failure: {error}"));
                result = Err(TransactionError::InstructionError {
                    index: u8::try_from(*index).unwrap_or(u8::MAX),
                    error: error.clone(),
                });
            }
        }

        if let Err(error) = &result {
            if !options.skip_preflight {
                state.log.push(SubmissionRecord {
                    signature: Some(signature),
                    recent_blockhash: tx.recent_blockhash,
                    kinds,
                    outcome: SubmissionOutcome::PreflightRejected(error.clone()),
                    confirmation_dropped: false,
                });
                debug!(error = %error, "preflight failed");
                return Err(LedgerError::PreflightFailed {
                    error: error.clone(),
                    logs,
                });
            }
        }

        // The transaction lands.
        state.slot += 1;
        let slot = state.slot;
        let outcome = match result {
            Ok(()) => {
                state.bank = working;
                SubmissionOutcome::Committed
            }
            Err(error) => {
                state.bank = charged;
                SubmissionOutcome::FailedOnLedger(error)
            }
        };
        let err = match &outcome {
            SubmissionOutcome::FailedOnLedger(error) => Some(error.clone()),
            _ => None,
        };
        let withheld = matches!(fault, Some((_, Fault::DropConfirmation)));
        state.track(
            signature,
            if withheld {
                Status::Withheld
            } else {
                Status::Landed(ConfirmationReport { slot, err })
            },
        );
        debug!(
            signature = %signature.short(),
            slot,
            ?outcome,
            withheld,
            "transaction landed"
        );
        state.log.push(SubmissionRecord {
            signature: Some(signature),
            recent_blockhash: tx.recent_blockhash,
            kinds,
            outcome,
            confirmation_dropped: withheld,
        });
        Ok(signature)
    }
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLedger")
            .field("settlement_program", &self.settlement_program)
            .field("block_height", &self.block_height())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LedgerConnection for LocalLedger {
    async fn get_latest_blockhash(
        &self,
        _commitment: CommitmentLevel,
    ) -> LedgerResult<LatestBlockhash> {
        let mut state = self.state();
        state.block_height += 1;
        let height = state.block_height;
        let mut hasher = Sha256::new();
        hasher.update(b"escrowflow:blockhash:");
        hasher.update(height.to_le_bytes());
        let blockhash = Blockhash(hasher.finalize().into());
        let last_valid_block_height = height + constants::BLOCKHASH_VALIDITY_BLOCKS;
        state.blockhashes.insert(blockhash, last_valid_block_height);
        state.blockhashes.retain(|_, last_valid| *last_valid >= height);
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        options: SubmitOptions,
    ) -> LedgerResult<Signature> {
        self.submit(transaction, options)
    }

    async fn confirm_transaction(
        &self,
        request: ConfirmRequest,
        _commitment: CommitmentLevel,
    ) -> LedgerResult<ConfirmationReport> {
        let status = self.state().statuses.get(&request.signature).cloned();
        match status {
            Some(Status::Landed(report)) => Ok(report),
            Some(Status::Withheld) => std::future::pending().await,
            Some(Status::Expired) | None => Err(LedgerError::BlockHeightExceeded {
                signature: request.signature,
                last_valid_block_height: request.last_valid_block_height,
            }),
        }
    }

    async fn get_account_balance(&self, account: &Address) -> LedgerResult<TokenAmount> {
        let state = self.state();
        let holder = state.bank.token_account(account).map_err(|_| {
            if state.bank.contains(account) {
                LedgerError::NotATokenAccount(*account)
            } else {
                LedgerError::AccountNotFound(*account)
            }
        })?;
        let decimals = state
            .bank
            .mint(&holder.mint)
            .map(|m| m.decimals)
            .map_err(|_| LedgerError::NotATokenAccount(*account))?;
        Ok(TokenAmount::new(holder.amount, decimals))
    }

    async fn account_exists(&self, account: &Address) -> LedgerResult<bool> {
        Ok(self.state().bank.contains(account))
    }

    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> LedgerResult<u64> {
        Ok(rent_exempt_minimum(size as u64))
    }
}
