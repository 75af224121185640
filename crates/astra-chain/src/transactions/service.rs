//! The send pipeline: stage → validate → build → estimate → sign → broadcast → confirm.

use crate::address::bech32_to_evm;
use crate::error::{ChainError, LifecycleError};
use crate::gas::{
    AllowanceEstimator, ApprovalEstimate, EvmCallEstimator, Fee, GasEstimate, GasEstimator,
    Simulator,
};
use crate::queries::ChainQueries;
use crate::transactions::builder::{BuildOutput, BuiltTransaction, TransactionBuilder};
use crate::transactions::intent::TransactionIntent;
use crate::transactions::lifecycle::TransactionLifecycleStore;
use crate::transactions::msg::{ChainMsg, EvmCall};
use astra_core::{Balance, IntentKind, TxState};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Flags passed to the wallet when signing.
///
/// Both are set so the wallet does not replace the fee and memo that were
/// just estimated and shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    pub prefer_no_set_fee: bool,
    pub prefer_no_set_memo: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            prefer_no_set_fee: true,
            prefer_no_set_memo: true,
        }
    }
}

/// Exported signing key. Never printed.
pub struct PrivateKey(pub Vec<u8>);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Final outcome of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub tx_hash: String,
    pub code: u32,
    pub height: u64,
    pub raw_log: String,
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Key management and broadcasting, provided by the wallet layer.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn export_private_key(&self) -> Result<PrivateKey, ChainError>;

    /// Sign and broadcast Cosmos messages; returns the tx hash once accepted.
    async fn sign_and_broadcast(
        &self,
        msgs: &[ChainMsg],
        fee: &Fee,
        memo: &str,
        options: SignOptions,
    ) -> Result<String, ChainError>;

    /// Sign and broadcast an EVM call; returns the tx hash once accepted.
    async fn sign_evm_transaction(
        &self,
        key: &PrivateKey,
        call: &EvmCall,
        gas_limit: u64,
        gas_price: Balance,
    ) -> Result<String, ChainError>;

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<TxResult, ChainError>;
}

type BroadcastHook = Box<dyn Fn(&str) + Send + Sync>;
type FulfilledHook = Box<dyn Fn(&TxResult) + Send + Sync>;

/// Callbacks for the two observable milestones of a send.
#[derive(Default)]
pub struct SendHooks {
    on_broadcasted: Option<BroadcastHook>,
    on_fulfilled: Option<FulfilledHook>,
}

impl SendHooks {
    /// Called when the node accepts the transaction, before it is confirmed.
    pub fn on_broadcasted(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_broadcasted = Some(Box::new(hook));
        self
    }

    /// Called once the transaction is confirmed successfully.
    pub fn on_fulfilled(mut self, hook: impl Fn(&TxResult) + Send + Sync + 'static) -> Self {
        self.on_fulfilled = Some(Box::new(hook));
        self
    }

    fn broadcasted(&self, hash: &str) {
        if let Some(hook) = &self.on_broadcasted {
            hook(hash);
        }
    }

    fn fulfilled(&self, result: &TxResult) {
        if let Some(hook) = &self.on_fulfilled {
            hook(result);
        }
    }
}

/// A validated, estimated transaction waiting for user confirmation.
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub sender: String,
    pub intent: TransactionIntent,
    pub build: BuildOutput,
    pub estimate: GasEstimate,
    /// ERC-20 approval that must precede a swap.
    pub approval: Option<ApprovalEstimate>,
}

impl PreparedTransaction {
    pub fn kind(&self) -> IntentKind {
        self.intent.kind()
    }

    /// Total fee including any approval.
    pub fn total_fee(&self) -> Balance {
        let approval = self.approval.as_ref().map_or(0, |a| {
            self.estimate
                .gas_price
                .saturating_mul(a.gas_limit as Balance)
        });
        self.estimate.fee_amount.saturating_add(approval)
    }
}

pub struct TransactionService {
    queries: ChainQueries,
    builder: TransactionBuilder,
    estimator: GasEstimator,
    lifecycle: Arc<TransactionLifecycleStore>,
    signer: Arc<dyn Signer>,
    simulator: Arc<dyn Simulator>,
    evm: Arc<dyn EvmCallEstimator>,
    staged: Mutex<Option<PreparedTransaction>>,
}

impl TransactionService {
    pub fn new(
        queries: ChainQueries,
        lifecycle: Arc<TransactionLifecycleStore>,
        signer: Arc<dyn Signer>,
        simulator: Arc<dyn Simulator>,
        evm: Arc<dyn EvmCallEstimator>,
    ) -> Self {
        let estimator = GasEstimator::new(queries.chain().fee_currency().clone());
        Self {
            builder: TransactionBuilder::new(queries.clone()),
            queries,
            estimator,
            lifecycle,
            signer,
            simulator,
            evm,
            staged: Mutex::new(None),
        }
    }

    pub fn with_gas_multiplier(mut self, multiplier: f64) -> Self {
        self.estimator = self.estimator.with_multiplier(multiplier);
        self
    }

    pub fn lifecycle(&self) -> &Arc<TransactionLifecycleStore> {
        &self.lifecycle
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    fn staged(&self) -> std::sync::MutexGuard<'_, Option<PreparedTransaction>> {
        self.staged.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fee market price, fetched once if not cached. Absent on failure.
    async fn suggested_gas_price(&self) -> Option<Balance> {
        let query = self.queries.fee_market();
        let data = match query.data() {
            Some(data) => data,
            None => query.wait_fresh_response().await.ok()?,
        };
        data.suggested_gas_price()
    }

    /// Stage an intent, validate it and estimate its fee.
    pub async fn prepare(
        &self,
        sender: &str,
        intent: TransactionIntent,
    ) -> Result<PreparedTransaction, ChainError> {
        self.lifecycle.update_raw_data(intent.clone())?;
        match self.prepare_staged(sender, intent.clone()).await {
            Ok(prepared) => {
                let mut staged = self.staged();
                // An overlapping prepare staged a newer intent meanwhile.
                if self.lifecycle.raw_data().as_ref() != Some(&prepared.intent) {
                    tracing::debug!("Dropping superseded {}", prepared.kind().label());
                    return Err(LifecycleError::Superseded.into());
                }
                *staged = Some(prepared.clone());
                Ok(prepared)
            }
            Err(e) => {
                self.lifecycle.discard(&intent);
                Err(e)
            }
        }
    }

    async fn prepare_staged(
        &self,
        sender: &str,
        intent: TransactionIntent,
    ) -> Result<PreparedTransaction, ChainError> {
        let build = self.builder.build(sender, &intent)?;
        let kind = intent.kind();
        let suggested = self.suggested_gas_price().await;

        let (estimate, approval) = match &build.tx {
            BuiltTransaction::Cosmos { msgs, memo } => {
                let estimate = self
                    .estimator
                    .estimate(self.simulator.as_ref(), kind, msgs, memo, suggested)
                    .await;
                (estimate, None)
            }
            BuiltTransaction::Evm(call) => {
                let from = bech32_to_evm(sender, &self.queries.chain().bech32_prefix)?;
                let approval = match &build.swap {
                    Some(plan) => Some(
                        AllowanceEstimator::new(self.evm.as_ref())
                            .estimate(from, plan.token_in, plan.router, plan.amount_in)
                            .await,
                    ),
                    None => None,
                };
                let estimate = self
                    .estimator
                    .estimate_evm(self.evm.as_ref(), kind, from, call, suggested)
                    .await;
                (estimate, approval)
            }
        };

        let prepared = PreparedTransaction {
            sender: sender.to_string(),
            intent,
            build,
            estimate,
            approval,
        };
        self.builder.check_fee_reserve(
            sender,
            &prepared.build.tx,
            &prepared.estimate.fee_denom,
            prepared.total_fee(),
        )?;
        Ok(prepared)
    }

    /// Sign, broadcast and confirm the staged transaction.
    ///
    /// Returns `Ok(None)` when the user declined to sign. If the lifecycle was
    /// abandoned while the send was in flight, the send still completes and
    /// returns its real outcome; only the lifecycle updates are skipped.
    pub async fn send_transaction(&self, hooks: SendHooks) -> Result<Option<TxResult>, ChainError> {
        let prepared = self
            .staged()
            .take()
            .ok_or(LifecycleError::NothingStaged)?;
        let intent = &prepared.intent;
        self.lifecycle.begin(intent)?;

        match self.execute(&prepared, &hooks).await {
            Ok(result) if result.is_success() => {
                self.lifecycle.settle(intent, TxState::Success);
                self.invalidate_touched(&prepared);
                hooks.fulfilled(&result);
                Ok(Some(result))
            }
            Ok(result) => {
                tracing::warn!(
                    "Transaction {} failed on chain with code {}: {}",
                    result.tx_hash,
                    result.code,
                    result.raw_log
                );
                self.lifecycle.settle(intent, TxState::Failure);
                self.invalidate_touched(&prepared);
                Err(ChainError::Broadcast(format!(
                    "code {}: {}",
                    result.code, result.raw_log
                )))
            }
            Err(e) if e.is_user_rejection() => {
                tracing::debug!("User declined to sign {}", prepared.kind().label());
                self.lifecycle.discard(intent);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", prepared.kind().label(), e);
                self.lifecycle.settle(intent, TxState::Failure);
                // A failed approval still paid its fee.
                self.invalidate_touched(&prepared);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        prepared: &PreparedTransaction,
        hooks: &SendHooks,
    ) -> Result<TxResult, ChainError> {
        let estimate = &prepared.estimate;
        let hash = match &prepared.build.tx {
            BuiltTransaction::Cosmos { msgs, memo } => {
                self.signer
                    .sign_and_broadcast(msgs, &estimate.fee(), memo, SignOptions::default())
                    .await?
            }
            BuiltTransaction::Evm(call) => {
                let key = self.signer.export_private_key().await?;
                if let (Some(approval), Some(plan)) = (&prepared.approval, &prepared.build.swap) {
                    let approve = approval.call(plan.token_in, plan.router);
                    let approve_hash = self
                        .signer
                        .sign_evm_transaction(&key, &approve, approval.gas_limit, estimate.gas_price)
                        .await?;
                    tracing::info!("Approval broadcast: {}", approve_hash);
                    let approved = self.signer.wait_for_confirmation(&approve_hash).await?;
                    if !approved.is_success() {
                        return Err(ChainError::Broadcast(format!(
                            "approval failed with code {}",
                            approved.code
                        )));
                    }
                }
                self.signer
                    .sign_evm_transaction(&key, call, estimate.gas_limit, estimate.gas_price)
                    .await?
            }
        };

        tracing::info!("{} broadcast: {}", prepared.kind().label(), hash);
        self.lifecycle.attach_tx_hash(&prepared.intent, &hash);
        hooks.broadcasted(&hash);

        self.signer.wait_for_confirmation(&hash).await
    }

    /// Refresh cache entries the transaction may have changed.
    ///
    /// History and NFT pages are refetched in the cache, but a `PagedList`
    /// only merges them on its next `refresh()`; list owners call it after a
    /// send completes.
    fn invalidate_touched(&self, prepared: &PreparedTransaction) {
        let chain = self.queries.chain();
        let sender = &prepared.sender;
        let mut prefixes = vec![
            format!("{}/cosmos/bank/v1beta1/balances/{}", chain.rest_url, sender),
            format!("{}/api/v1/txs", chain.indexer_url),
        ];
        match prepared.kind() {
            IntentKind::Send => {}
            IntentKind::Swap => {
                prefixes.push(format!("{}/api/v1/tokens", chain.indexer_url));
            }
            IntentKind::TransferNft => {
                prefixes.push(format!("{}/api/v1/tokens", chain.indexer_url));
                prefixes.push(format!("{}/api/v1/nfts", chain.nft_hub_url));
            }
            IntentKind::Delegate
            | IntentKind::Undelegate
            | IntentKind::Redelegate
            | IntentKind::WithdrawRewards => {
                prefixes.push(format!(
                    "{}/cosmos/staking/v1beta1/delegations/{}",
                    chain.rest_url, sender
                ));
                prefixes.push(format!(
                    "{}/cosmos/staking/v1beta1/delegators/{}/",
                    chain.rest_url, sender
                ));
                prefixes.push(format!(
                    "{}/cosmos/distribution/v1beta1/delegators/{}/",
                    chain.rest_url, sender
                ));
            }
        }
        for prefix in prefixes {
            self.queries.cache().invalidate(&prefix);
        }
    }
}
