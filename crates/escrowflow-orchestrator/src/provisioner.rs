//! Asset classes and holding accounts.
//!
//! Every failure is wrapped in [`EscrowFlowError::ProvisioningFailed`] naming
//! the asset or account involved. Nothing is rolled back: an asset created
//! before a later failure stays on the ledger.

use escrowflow_address::EscrowDeriver;
use escrowflow_ledger::{ConfirmationWaiter, LedgerConnection};
use escrowflow_types::{
    Address, EscrowFlowError, FlowStep, Keypair, LedgerError, Result, Signature,
    TransactionSigner, constants,
    program::{TOKEN_PROGRAM_ID, system, token},
};
use tracing::{debug, info};

fn provisioning_failed(subject: String, source: EscrowFlowError) -> EscrowFlowError {
    EscrowFlowError::ProvisioningFailed {
        subject,
        source: Box::new(source),
    }
}

fn connection_failed(step: FlowStep, source: LedgerError) -> EscrowFlowError {
    EscrowFlowError::SubmissionRejected { step, source }
}

/// A holding account and the signature that created it, if this call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodyAccount {
    pub address: Address,
    pub created: Option<Signature>,
}

pub struct AssetProvisioner<'a, L: LedgerConnection + ?Sized> {
    connection: &'a L,
    waiter: ConfirmationWaiter,
    deriver: EscrowDeriver,
}

impl<'a, L: LedgerConnection + ?Sized> AssetProvisioner<'a, L> {
    #[must_use]
    pub fn new(connection: &'a L, waiter: ConfirmationWaiter, deriver: EscrowDeriver) -> Self {
        Self {
            connection,
            waiter,
            deriver,
        }
    }

    /// Create a new asset class with `authority` as mint authority and fee
    /// payer. Returns its identity and the creation signature.
    pub async fn ensure_asset(
        &self,
        decimals: u8,
        authority: &dyn TransactionSigner,
    ) -> Result<(Address, Signature)> {
        let mint = Keypair::generate();
        let asset = mint.address();
        let subject = format!("asset {asset}");
        let step = FlowStep::CreateAssets;

        let rent = self
            .connection
            .minimum_balance_for_rent_exemption(constants::MINT_SIZE)
            .await
            .map_err(|e| provisioning_failed(subject.clone(), connection_failed(step, e)))?;
        let payer = authority.address();
        let instructions = vec![
            system::create_account(
                payer,
                asset,
                rent,
                constants::MINT_SIZE as u64,
                TOKEN_PROGRAM_ID,
            ),
            token::initialize_mint2(asset, decimals, payer, None),
        ];
        let signature = self
            .waiter
            .submit_and_confirm(self.connection, step, payer, instructions, &[authority, &mint])
            .await
            .map_err(|e| provisioning_failed(subject, e))?;
        info!(asset = %asset.short(), decimals, "asset class created");
        Ok((asset, signature))
    }

    /// Make sure `owner`'s holding account for `asset` exists; `payer` funds
    /// it if it has to be created.
    pub async fn ensure_custody_account(
        &self,
        payer: &dyn TransactionSigner,
        owner: Address,
        asset: Address,
    ) -> Result<CustodyAccount> {
        let subject = format!("holding account of {} for asset {}", owner.short(), asset.short());
        let step = FlowStep::ProvisionAccounts;
        let address = self
            .deriver
            .derive_custody_account(&owner, &asset, false)
            .map_err(|e| provisioning_failed(subject.clone(), e))?;

        let exists = self
            .connection
            .account_exists(&address)
            .await
            .map_err(|e| provisioning_failed(subject.clone(), connection_failed(step, e)))?;
        if exists {
            debug!(account = %address.short(), "holding account already present");
            return Ok(CustodyAccount {
                address,
                created: None,
            });
        }

        let instruction =
            token::create_associated_account_idempotent(payer.address(), address, owner, asset);
        let signature = self
            .waiter
            .submit_and_confirm(self.connection, step, payer.address(), vec![instruction], &[payer])
            .await
            .map_err(|e| provisioning_failed(subject, e))?;
        debug!(account = %address.short(), owner = %owner.short(), "holding account created");
        Ok(CustodyAccount {
            address,
            created: Some(signature),
        })
    }

    /// Mint `amount` of `asset` into `destination`.
    pub async fn fund_asset(
        &self,
        asset: Address,
        destination: Address,
        amount: u64,
        authority: &dyn TransactionSigner,
    ) -> Result<Signature> {
        let instruction = token::mint_to(asset, destination, authority.address(), amount);
        let signature = self
            .waiter
            .submit_and_confirm(
                self.connection,
                FlowStep::FundAccounts,
                authority.address(),
                vec![instruction],
                &[authority],
            )
            .await
            .map_err(|e| {
                provisioning_failed(
                    format!("funding {} with asset {}", destination.short(), asset.short()),
                    e,
                )
            })?;
        debug!(asset = %asset.short(), destination = %destination.short(), amount, "funded");
        Ok(signature)
    }
}
