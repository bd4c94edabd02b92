//! Submit-and-confirm for one step.
//!
//! Every call fetches a fresh blockhash right before signing, so each step
//! gets its own validity window. Outcomes map to errors as follows:
//!
//! - blockhash fetch or submission refused: `SubmissionRejected`
//! - no terminal status within the bounded wait (elapsed, blockhash expired,
//!   or the node failed mid-wait): `ConfirmationTimeout`
//! - report carries an error payload: `ConfirmationFailed`

use std::time::Duration;

use escrowflow_types::{
    Address, CommitmentLevel, ConfirmRequest, EscrowFlowError, FlowConfig, FlowStep, Instruction,
    LedgerError, Result, Signature, SubmitOptions, Transaction, TransactionSigner,
};
use tracing::{debug, warn};

use crate::connection::LedgerConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationWaiter {
    commitment: CommitmentLevel,
    options: SubmitOptions,
    timeout: Duration,
}

impl ConfirmationWaiter {
    #[must_use]
    pub fn new(commitment: CommitmentLevel, options: SubmitOptions, timeout: Duration) -> Self {
        Self {
            commitment,
            options,
            timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(
            config.commitment,
            config.submit_options(),
            config.confirm_timeout(),
        )
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build, sign, submit and confirm one transaction for `step`.
    ///
    /// `signers` must cover the fee payer and every signer account named by
    /// `instructions`.
    ///
    /// # Errors
    /// [`EscrowFlowError::SubmissionRejected`], [`EscrowFlowError::ConfirmationTimeout`]
    /// or [`EscrowFlowError::ConfirmationFailed`], all tagged with `step`;
    /// [`EscrowFlowError::MissingSigner`] if `signers` is incomplete.
    pub async fn submit_and_confirm<L: LedgerConnection + ?Sized>(
        &self,
        connection: &L,
        step: FlowStep,
        fee_payer: Address,
        instructions: Vec<Instruction>,
        signers: &[&dyn TransactionSigner],
    ) -> Result<Signature> {
        let rejected = |source: LedgerError| EscrowFlowError::SubmissionRejected { step, source };

        let latest = connection
            .get_latest_blockhash(self.commitment)
            .await
            .map_err(rejected)?;

        let mut transaction = Transaction::new_unsigned(fee_payer, instructions, latest.blockhash);
        transaction.sign(signers)?;

        let signature = connection
            .submit_transaction(&transaction, self.options)
            .await
            .map_err(|source| {
                if let Some(line) = source.logs().last() {
                    warn!(%step, %line, "preflight rejected");
                }
                rejected(source)
            })?;
        debug!(%step, signature = %signature.short(), "submitted");

        let request = ConfirmRequest {
            signature,
            blockhash: latest.blockhash,
            last_valid_block_height: latest.last_valid_block_height,
        };

        let report = match tokio::time::timeout(
            self.timeout,
            connection.confirm_transaction(request, self.commitment),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(LedgerError::BlockHeightExceeded { .. })) => {
                warn!(
                    %step,
                    signature = %signature.short(),
                    "blockhash expired before confirmation"
                );
                return Err(EscrowFlowError::ConfirmationTimeout { step, signature });
            }
            Ok(Err(e)) => {
                warn!(
                    %step,
                    signature = %signature.short(),
                    error = %e,
                    "confirmation status unknown"
                );
                return Err(EscrowFlowError::ConfirmationTimeout { step, signature });
            }
            Err(_) => {
                warn!(
                    %step,
                    signature = %signature.short(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "confirmation wait elapsed"
                );
                return Err(EscrowFlowError::ConfirmationTimeout { step, signature });
            }
        };

        if let Some(reason) = report.err {
            return Err(EscrowFlowError::ConfirmationFailed {
                step,
                signature,
                reason,
            });
        }

        debug!(%step, signature = %signature.short(), slot = report.slot, "confirmed");
        Ok(signature)
    }
}
