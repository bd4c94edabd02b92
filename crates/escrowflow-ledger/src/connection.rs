//! The ledger connection seam.
//!
//! Everything the orchestrator needs from a ledger node, as one async trait.
//! [`crate::LocalLedger`] implements it in-process; a remote node client would
//! implement the same trait over its RPC transport.

use std::sync::Arc;

use async_trait::async_trait;
use escrowflow_types::{
    Address, CommitmentLevel, ConfirmRequest, ConfirmationReport, LatestBlockhash, LedgerResult,
    Signature, SubmitOptions, TokenAmount, Transaction,
};

#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// A fresh blockhash and the last block height at which it is valid.
    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> LedgerResult<LatestBlockhash>;

    /// Submit a signed transaction. Returns its signature once the node has
    /// accepted it; acceptance says nothing about the outcome.
    ///
    /// With preflight enabled, a transaction that would fail is rejected here
    /// with [`escrowflow_types::LedgerError::PreflightFailed`].
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        options: SubmitOptions,
    ) -> LedgerResult<Signature>;

    /// Wait until the signature reaches `commitment` or its blockhash expires.
    ///
    /// A report with `err` set means the transaction landed and failed.
    async fn confirm_transaction(
        &self,
        request: ConfirmRequest,
        commitment: CommitmentLevel,
    ) -> LedgerResult<ConfirmationReport>;

    /// Token balance of a custody account.
    async fn get_account_balance(&self, account: &Address) -> LedgerResult<TokenAmount>;

    async fn account_exists(&self, account: &Address) -> LedgerResult<bool>;

    /// Lamports an account of `size` bytes must hold to be rent exempt.
    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> LedgerResult<u64>;
}

#[async_trait]
impl<T: LedgerConnection + ?Sized> LedgerConnection for Arc<T> {
    async fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> LedgerResult<LatestBlockhash> {
        (**self).get_latest_blockhash(commitment).await
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        options: SubmitOptions,
    ) -> LedgerResult<Signature> {
        (**self).submit_transaction(transaction, options).await
    }

    async fn confirm_transaction(
        &self,
        request: ConfirmRequest,
        commitment: CommitmentLevel,
    ) -> LedgerResult<ConfirmationReport> {
        (**self).confirm_transaction(request, commitment).await
    }

    async fn get_account_balance(&self, account: &Address) -> LedgerResult<TokenAmount> {
        (**self).get_account_balance(account).await
    }

    async fn account_exists(&self, account: &Address) -> LedgerResult<bool> {
        (**self).account_exists(account).await
    }

    async fn minimum_balance_for_rent_exemption(&self, size: usize) -> LedgerResult<u64> {
        (**self).minimum_balance_for_rent_exemption(size).await
    }
}
