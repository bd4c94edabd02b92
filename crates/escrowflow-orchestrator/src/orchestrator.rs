//! The escrow flow driver.
//!
//! ```text
//! guard -> provision (assets, holding accounts, funding)
//!       -> derive escrow addresses -> plan
//!       -> initialize -> deposit-maker -> deposit-taker -> execute
//!       -> read balances -> receipt
//! ```
//!
//! Once execute has confirmed the swap is final. A failure to read the
//! balances afterwards is logged and leaves `balances` empty in the receipt;
//! it never fails the run.
//!
//! Steps run strictly in sequence, one transaction each. A failed step aborts
//! the run with its step-tagged error; nothing is retried or compensated.
//! Failures that leave funds in escrow custody are reported through
//! [`FlowEvent::FundsStranded`] and logged at error level.

use std::sync::Arc;

use chrono::Utc;
use escrowflow_address::{EscrowAddresses, EscrowDeriver};
use escrowflow_ledger::{ConfirmationWaiter, LedgerConnection};
use escrowflow_types::{
    Address, EscrowFlowError, EscrowId, EscrowState, FinalBalances, FlowConfig, FlowRunId,
    FlowStep, LedgerResult, Result, SettlementReceipt, Signature, StepSignature,
    TransactionSigner, Wallet, constants,
};
use tracing::{Instrument, debug, error, field, info, info_span, warn};

use crate::{
    events::{FlowEvent, FlowObserver},
    guard::FlowGuard,
    plan::{EscrowPlan, EscrowTerms, Party},
    provisioner::AssetProvisioner,
};

/// Where the two asset classes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// Create two fresh asset classes and mint the configured initial supply
    /// to each party. `None` uses the configured decimals.
    Provision { decimals: Option<u8> },
    /// Reuse existing asset classes. Holding accounts are still ensured;
    /// nothing is minted.
    Existing {
        maker_asset: Address,
        taker_asset: Address,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowRequest {
    /// Generated when absent.
    pub escrow_id: Option<EscrowId>,
    pub maker_amount: u64,
    pub taker_amount: u64,
    pub assets: AssetSource,
}

impl EscrowRequest {
    #[must_use]
    pub fn new(maker_amount: u64, taker_amount: u64) -> Self {
        Self {
            escrow_id: None,
            maker_amount,
            taker_amount,
            assets: AssetSource::Provision { decimals: None },
        }
    }

    #[must_use]
    pub fn with_escrow_id(mut self, escrow_id: EscrowId) -> Self {
        self.escrow_id = Some(escrow_id);
        self
    }

    #[must_use]
    pub fn with_existing_assets(mut self, maker_asset: Address, taker_asset: Address) -> Self {
        self.assets = AssetSource::Existing {
            maker_asset,
            taker_asset,
        };
        self
    }

    /// Reject requests the settlement program would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| -> Result<()> {
            Err(EscrowFlowError::InvalidRequest {
                reason: reason.to_string(),
            })
        };
        if self.maker_amount == 0 || self.taker_amount == 0 {
            return invalid("amounts must be greater than zero");
        }
        match self.assets {
            AssetSource::Provision {
                decimals: Some(d),
            } if d > constants::MAX_ASSET_DECIMALS => invalid("asset decimals must be at most 9"),
            AssetSource::Existing {
                maker_asset,
                taker_asset,
            } if maker_asset == taker_asset => invalid("maker and taker assets must differ"),
            _ => Ok(()),
        }
    }
}

/// Runs escrow flows against one ledger connection, one at a time.
pub struct EscrowOrchestrator<L: LedgerConnection + ?Sized = dyn LedgerConnection> {
    connection: Arc<L>,
    config: FlowConfig,
    deriver: EscrowDeriver,
    waiter: ConfirmationWaiter,
    guard: FlowGuard,
    observers: Vec<Arc<dyn FlowObserver>>,
}

impl<L: LedgerConnection + ?Sized> EscrowOrchestrator<L> {
    /// # Errors
    /// [`EscrowFlowError::Configuration`] if `config` fails validation.
    pub fn new(connection: Arc<L>, config: FlowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connection,
            deriver: EscrowDeriver::new(config.settlement_program),
            waiter: ConfirmationWaiter::from_config(&config),
            config,
            guard: FlowGuard::new(),
            observers: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn deriver(&self) -> &EscrowDeriver {
        &self.deriver
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<L> {
        &self.connection
    }

    /// Whether a flow currently holds the guard.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    /// Provision, initialize, deposit both sides and execute one escrow.
    ///
    /// Signers are borrowed from the wallets for this call only.
    ///
    /// # Errors
    /// - [`EscrowFlowError::AlreadyInProgress`] while another flow runs; no
    ///   ledger call is made
    /// - [`EscrowFlowError::NotConnected`] if either wallet has no signer
    /// - [`EscrowFlowError::InvalidRequest`] for zero amounts or identical
    ///   assets or parties
    /// - [`EscrowFlowError::ProvisioningFailed`] if setup fails
    /// - the step-tagged error of the first failing escrow step
    pub async fn run_escrow_flow(
        &self,
        maker: &Wallet,
        taker: &Wallet,
        request: &EscrowRequest,
    ) -> Result<SettlementReceipt> {
        let _token = self.guard.try_acquire()?;

        let maker = maker
            .signer()
            .ok_or(EscrowFlowError::NotConnected { party: "maker" })?;
        let taker = taker
            .signer()
            .ok_or(EscrowFlowError::NotConnected { party: "taker" })?;
        request.validate()?;
        if maker.address() == taker.address() {
            return Err(EscrowFlowError::InvalidRequest {
                reason: "maker and taker must be different parties".into(),
            });
        }

        let run_id = FlowRunId::new();
        let span = info_span!("escrow_flow", %run_id, escrow_id = field::Empty);
        self.run(run_id, maker, taker, request).instrument(span).await
    }

    async fn run(
        &self,
        run_id: FlowRunId,
        maker: &dyn TransactionSigner,
        taker: &dyn TransactionSigner,
        request: &EscrowRequest,
    ) -> Result<SettlementReceipt> {
        let started_at = Utc::now();
        info!(
            maker = %maker.address().short(),
            taker = %taker.address().short(),
            maker_amount = request.maker_amount,
            taker_amount = request.taker_amount,
            "escrow flow started"
        );

        let mut provisioning_signatures = Vec::new();
        let (maker_asset, taker_asset) = self
            .provision(run_id, maker, taker, request, &mut provisioning_signatures)
            .await?;

        let escrow_id = request.escrow_id.unwrap_or_else(EscrowId::generate);
        tracing::Span::current().record("escrow_id", escrow_id.0);
        let terms = EscrowTerms {
            escrow_id,
            maker: maker.address(),
            taker: taker.address(),
            maker_asset,
            taker_asset,
            maker_amount: request.maker_amount,
            taker_amount: request.taker_amount,
        };
        let addresses = self.deriver.derive_all(
            &terms.maker,
            &terms.taker,
            &terms.maker_asset,
            &terms.taker_asset,
            escrow_id,
        )?;
        info!(
            %escrow_id,
            escrow = %addresses.escrow,
            bump = addresses.bump,
            "escrow address derived"
        );
        let plan = EscrowPlan::new(self.deriver.program_id(), terms, addresses);

        let (signatures, final_state) = self.execute_plan(run_id, &plan, maker, taker).await?;
        let balances = match self.read_balances(&addresses).await {
            Ok(balances) => Some(balances),
            Err(err) => {
                warn!(
                    %escrow_id,
                    escrow = %addresses.escrow,
                    error = %err,
                    "settled; final balances unreadable"
                );
                None
            }
        };

        let receipt = SettlementReceipt {
            run_id,
            escrow_id,
            escrow: addresses.escrow,
            escrow_bump: addresses.bump,
            maker: terms.maker,
            taker: terms.taker,
            maker_asset,
            taker_asset,
            maker_amount: terms.maker_amount,
            taker_amount: terms.taker_amount,
            signatures,
            provisioning_signatures,
            final_state,
            balances,
            started_at,
            completed_at: Utc::now(),
        };
        self.emit(
            run_id,
            &FlowEvent::Completed {
                escrow: addresses.escrow,
                signatures: receipt.signatures.len(),
            },
        );
        Ok(receipt)
    }

    // -----------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------

    async fn provision(
        &self,
        run_id: FlowRunId,
        maker: &dyn TransactionSigner,
        taker: &dyn TransactionSigner,
        request: &EscrowRequest,
        signatures: &mut Vec<StepSignature>,
    ) -> Result<(Address, Address)> {
        let provisioner = AssetProvisioner::new(&*self.connection, self.waiter, self.deriver);

        let (maker_asset, taker_asset, mint_supply) = match request.assets {
            AssetSource::Provision { decimals } => {
                let decimals = decimals.unwrap_or(self.config.asset_decimals);
                let step = FlowStep::CreateAssets;
                self.emit(run_id, &FlowEvent::StepStarted { step });
                let (maker_asset, signature) =
                    self.observe(run_id, step, provisioner.ensure_asset(decimals, maker).await)?;
                self.confirmed(run_id, step, signature, signatures);
                let (taker_asset, signature) =
                    self.observe(run_id, step, provisioner.ensure_asset(decimals, maker).await)?;
                self.confirmed(run_id, step, signature, signatures);
                (maker_asset, taker_asset, true)
            }
            AssetSource::Existing {
                maker_asset,
                taker_asset,
            } => (maker_asset, taker_asset, false),
        };

        let step = FlowStep::ProvisionAccounts;
        self.emit(run_id, &FlowEvent::StepStarted { step });
        let mut sources = Vec::with_capacity(2);
        for (owner, asset, is_source) in [
            (maker, maker_asset, true),
            (maker, taker_asset, false),
            (taker, taker_asset, true),
            (taker, maker_asset, false),
        ] {
            let account = self.observe(
                run_id,
                step,
                provisioner
                    .ensure_custody_account(owner, owner.address(), asset)
                    .await,
            )?;
            if let Some(signature) = account.created {
                self.confirmed(run_id, step, signature, signatures);
            }
            if is_source {
                sources.push((asset, account.address));
            }
        }

        if mint_supply {
            let step = FlowStep::FundAccounts;
            self.emit(run_id, &FlowEvent::StepStarted { step });
            for (asset, destination) in sources {
                let signature = self.observe(
                    run_id,
                    step,
                    provisioner
                        .fund_asset(asset, destination, self.config.initial_supply, maker)
                        .await,
                )?;
                self.confirmed(run_id, step, signature, signatures);
            }
        }

        info!(
            maker_asset = %maker_asset.short(),
            taker_asset = %taker_asset.short(),
            transactions = signatures.len(),
            "provisioning complete"
        );
        Ok((maker_asset, taker_asset))
    }

    // -----------------------------------------------------------------
    // Escrow steps
    // -----------------------------------------------------------------

    async fn execute_plan(
        &self,
        run_id: FlowRunId,
        plan: &EscrowPlan,
        maker: &dyn TransactionSigner,
        taker: &dyn TransactionSigner,
    ) -> Result<(Vec<StepSignature>, EscrowState)> {
        let escrow = plan.addresses().escrow;
        let mut state = EscrowState::Uninitialized;
        let mut signatures = Vec::with_capacity(plan.steps().len());

        for planned in plan.steps() {
            let step = planned.step();
            let signer = match planned.signer {
                Party::Maker => maker,
                Party::Taker => taker,
            };
            self.emit(run_id, &FlowEvent::StepStarted { step });
            debug!(
                %step,
                signer = planned.signer.label(),
                requires = %planned.transition.requires,
                "submitting escrow step"
            );

            let outcome = self
                .waiter
                .submit_and_confirm(
                    &*self.connection,
                    step,
                    signer.address(),
                    vec![planned.instruction.clone()],
                    &[signer],
                )
                .await;
            let signature = match self.observe(run_id, step, outcome) {
                Ok(signature) => signature,
                Err(err) => {
                    if err.requires_operator_intervention() {
                        error!(
                            escrow_id = %plan.terms().escrow_id,
                            escrow = %escrow,
                            %step,
                            last_confirmed = %state,
                            error = %err,
                            "escrow left holding funds; operator intervention required"
                        );
                        self.emit(
                            run_id,
                            &FlowEvent::FundsStranded {
                                escrow,
                                step,
                                last_confirmed: state,
                            },
                        );
                    } else {
                        warn!(%step, error = %err, "escrow step failed");
                    }
                    return Err(err);
                }
            };

            let next = planned.transition.yields;
            signatures.push(StepSignature { step, signature });
            self.emit(run_id, &FlowEvent::StepConfirmed { step, signature });
            self.emit(
                run_id,
                &FlowEvent::StateChanged {
                    escrow,
                    from: state,
                    to: next,
                },
            );
            state = next;
        }
        Ok((signatures, state))
    }

    /// Read back all six balances once the escrow has settled.
    async fn read_balances(&self, addresses: &EscrowAddresses) -> LedgerResult<FinalBalances> {
        let connection = &*self.connection;
        Ok(FinalBalances {
            maker_maker_asset: connection.get_account_balance(&addresses.maker_source).await?,
            maker_taker_asset: connection.get_account_balance(&addresses.maker_receive).await?,
            taker_taker_asset: connection.get_account_balance(&addresses.taker_source).await?,
            taker_maker_asset: connection.get_account_balance(&addresses.taker_receive).await?,
            escrow_maker_custody: connection
                .get_account_balance(&addresses.escrow_maker_custody)
                .await?,
            escrow_taker_custody: connection
                .get_account_balance(&addresses.escrow_taker_custody)
                .await?,
        })
    }

    // -----------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------

    fn emit(&self, run_id: FlowRunId, event: &FlowEvent) {
        for observer in &self.observers {
            observer.on_event(run_id, event);
        }
    }

    fn observe<T>(&self, run_id: FlowRunId, step: FlowStep, outcome: Result<T>) -> Result<T> {
        if let Err(err) = &outcome {
            self.emit(
                run_id,
                &FlowEvent::StepFailed {
                    step,
                    error: err.to_string(),
                },
            );
        }
        outcome
    }

    fn confirmed(
        &self,
        run_id: FlowRunId,
        step: FlowStep,
        signature: Signature,
        signatures: &mut Vec<StepSignature>,
    ) {
        signatures.push(StepSignature { step, signature });
        self.emit(run_id, &FlowEvent::StepConfirmed { step, signature });
    }
}
