//! Gas and fee estimation.
//!
//! Estimation is two-tier: simulate with a placeholder fee and scale the
//! reported gas by the multiplier, or fall back to the per-intent default limit
//! when simulation fails. A failed simulation never fails the estimate; the
//! error is kept on the result for logging.

use crate::error::ChainError;
use crate::transactions::msg::{ChainMsg, EvmCall};
use alloy_primitives::{Address, U256};
use astra_core::{Balance, Coin, Currency, IntentKind};
use async_trait::async_trait;

/// 10 gwei-equivalent in the fee currency's minimal denom.
pub const DEFAULT_GAS_PRICE: Balance = 10_000_000_000;

pub const DEFAULT_GAS_MULTIPLIER: f64 = 1.3;

/// Gas for an ERC-20 approval when even the exact-amount simulation fails.
pub const DEFAULT_APPROVE_GAS: u64 = 100_000;

/// Default gas limit for an intent with `msg_count` messages.
pub fn default_gas_limit(kind: IntentKind, msg_count: usize) -> u64 {
    match kind {
        IntentKind::Send => 100_000,
        IntentKind::Delegate => 250_000,
        IntentKind::Undelegate => 300_000,
        IntentKind::Redelegate => 400_000,
        IntentKind::WithdrawRewards => 150_000 * msg_count.max(1) as u64,
        IntentKind::Swap => 350_000,
        IntentKind::TransferNft => 200_000,
    }
}

/// Placeholder fee parameters for one intent kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasConfig {
    pub gas_price: Balance,
    pub gas_limit: u64,
    pub gas_multiplier: f64,
}

impl GasConfig {
    pub fn for_intent(kind: IntentKind, msg_count: usize) -> Self {
        Self {
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: default_gas_limit(kind, msg_count),
            gas_multiplier: DEFAULT_GAS_MULTIPLIER,
        }
    }

    pub fn fee_amount(&self) -> Balance {
        self.gas_price.saturating_mul(self.gas_limit as Balance)
    }
}

/// Fee attached to a Cosmos transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

#[derive(Debug, Clone)]
pub struct GasEstimate {
    pub gas_limit: u64,
    pub gas_price: Balance,
    pub fee_amount: Balance,
    pub fee_denom: String,
    /// Set when simulation failed and the defaults were used instead.
    pub simulation_error: Option<ChainError>,
}

impl GasEstimate {
    pub fn is_fallback(&self) -> bool {
        self.simulation_error.is_some()
    }

    pub fn fee(&self) -> Fee {
        Fee {
            amount: vec![Coin::new(self.fee_denom.clone(), self.fee_amount)],
            gas_limit: self.gas_limit,
        }
    }
}

/// Simulation RPC of the external signing client.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Gas used by the message set.
    async fn simulate(&self, msgs: &[ChainMsg], fee: &Fee, memo: &str) -> Result<u64, ChainError>;
}

/// `eth_estimateGas` of the external EVM client.
#[async_trait]
pub trait EvmCallEstimator: Send + Sync {
    async fn estimate_gas(&self, from: Address, call: &EvmCall) -> Result<u64, ChainError>;
}

/// Scale simulated gas by the multiplier, rounding up.
pub fn apply_multiplier(gas_used: u64, multiplier: f64) -> u64 {
    (gas_used as f64 * multiplier).ceil() as u64
}

/// Fee estimator for one fee currency.
#[derive(Debug, Clone)]
pub struct GasEstimator {
    fee_currency: Currency,
    multiplier_override: Option<f64>,
}

impl GasEstimator {
    pub fn new(fee_currency: Currency) -> Self {
        Self {
            fee_currency,
            multiplier_override: None,
        }
    }

    /// Use a custom gas multiplier instead of the default.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        if multiplier.is_finite() && multiplier >= 1.0 {
            self.multiplier_override = Some(multiplier);
        } else {
            tracing::warn!("Ignoring gas multiplier {}; must be >= 1.0", multiplier);
        }
        self
    }

    /// Defaults for an intent, with the fee market's price applied when positive.
    pub fn config(
        &self,
        kind: IntentKind,
        msg_count: usize,
        suggested_gas_price: Option<Balance>,
    ) -> GasConfig {
        let mut config = GasConfig::for_intent(kind, msg_count);
        if let Some(price) = suggested_gas_price
            && price > 0
        {
            config.gas_price = price;
        }
        if let Some(multiplier) = self.multiplier_override {
            config.gas_multiplier = multiplier;
        }
        config
    }

    fn finish(
        &self,
        config: &GasConfig,
        simulated: Result<u64, ChainError>,
        kind: IntentKind,
    ) -> GasEstimate {
        let (gas_limit, simulation_error) = match simulated {
            Ok(gas_used) => (apply_multiplier(gas_used, config.gas_multiplier), None),
            Err(e) => {
                tracing::warn!(
                    "Gas simulation for {} failed, using default limit {}: {}",
                    kind.label(),
                    config.gas_limit,
                    e
                );
                (config.gas_limit, Some(e))
            }
        };
        GasEstimate {
            gas_limit,
            gas_price: config.gas_price,
            fee_amount: config.gas_price.saturating_mul(gas_limit as Balance),
            fee_denom: self.fee_currency.coin_minimal_denom.clone(),
            simulation_error,
        }
    }

    /// Defaults only, without simulating.
    pub fn default_estimate(
        &self,
        kind: IntentKind,
        msg_count: usize,
        suggested_gas_price: Option<Balance>,
    ) -> GasEstimate {
        let config = self.config(kind, msg_count, suggested_gas_price);
        GasEstimate {
            gas_limit: config.gas_limit,
            gas_price: config.gas_price,
            fee_amount: config.fee_amount(),
            fee_denom: self.fee_currency.coin_minimal_denom.clone(),
            simulation_error: None,
        }
    }

    /// Estimate a Cosmos message set.
    pub async fn estimate(
        &self,
        simulator: &dyn Simulator,
        kind: IntentKind,
        msgs: &[ChainMsg],
        memo: &str,
        suggested_gas_price: Option<Balance>,
    ) -> GasEstimate {
        let config = self.config(kind, msgs.len(), suggested_gas_price);
        let placeholder = Fee {
            amount: vec![Coin::new(
                self.fee_currency.coin_minimal_denom.clone(),
                config.fee_amount(),
            )],
            gas_limit: config.gas_limit,
        };
        let simulated = simulator.simulate(msgs, &placeholder, memo).await;
        if let Ok(gas_used) = &simulated {
            tracing::debug!("Simulated {}: {} gas used", kind.label(), gas_used);
        }
        self.finish(&config, simulated, kind)
    }

    /// Estimate an EVM call.
    pub async fn estimate_evm(
        &self,
        estimator: &dyn EvmCallEstimator,
        kind: IntentKind,
        from: Address,
        call: &EvmCall,
        suggested_gas_price: Option<Balance>,
    ) -> GasEstimate {
        let config = self.config(kind, 1, suggested_gas_price);
        let simulated = estimator.estimate_gas(from, call).await;
        self.finish(&config, simulated, kind)
    }
}

/// Outcome of an ERC-20 approval estimate.
#[derive(Debug, Clone)]
pub struct ApprovalEstimate {
    pub gas_limit: u64,
    /// Amount to approve: `U256::MAX` unless the token refused it.
    pub amount: U256,
    /// Whether the exact amount must be approved.
    pub use_exact: bool,
    pub simulation_error: Option<ChainError>,
}

impl ApprovalEstimate {
    /// The approval call matching what was simulated.
    pub fn call(&self, token: Address, spender: Address) -> EvmCall {
        EvmCall::approve(token, spender, self.amount)
    }
}

/// Estimates ERC-20 approvals, preferring an unlimited allowance.
///
/// Which mode a token accepted is not remembered between estimates.
pub struct AllowanceEstimator<'a> {
    estimator: &'a dyn EvmCallEstimator,
    multiplier: f64,
}

impl<'a> AllowanceEstimator<'a> {
    pub fn new(estimator: &'a dyn EvmCallEstimator) -> Self {
        Self {
            estimator,
            multiplier: DEFAULT_GAS_MULTIPLIER,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub async fn estimate(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        exact_amount: U256,
    ) -> ApprovalEstimate {
        let unlimited = EvmCall::approve(token, spender, U256::MAX);
        match self.estimator.estimate_gas(owner, &unlimited).await {
            Ok(gas) => {
                return ApprovalEstimate {
                    gas_limit: apply_multiplier(gas, self.multiplier),
                    amount: U256::MAX,
                    use_exact: false,
                    simulation_error: None,
                };
            }
            Err(e) => {
                tracing::debug!("Unlimited approval rejected for {}: {}", token, e);
            }
        }

        let exact = EvmCall::approve(token, spender, exact_amount);
        match self.estimator.estimate_gas(owner, &exact).await {
            Ok(gas) => ApprovalEstimate {
                gas_limit: apply_multiplier(gas, self.multiplier),
                amount: exact_amount,
                use_exact: true,
                simulation_error: None,
            },
            Err(e) => {
                tracing::warn!(
                    "Approval simulation for {} failed, using default limit {}: {}",
                    token,
                    DEFAULT_APPROVE_GAS,
                    e
                );
                ApprovalEstimate {
                    gas_limit: DEFAULT_APPROVE_GAS,
                    amount: exact_amount,
                    use_exact: true,
                    simulation_error: Some(e),
                }
            }
        }
    }
}
