//! Staking state for one account, with derived totals and APR.

use super::ChainQueries;
use super::account::BalancesResponse;
use super::params::{BlockProvisionResponse, MintParamsResponse, PoolResponse};
use super::staking::{
    DelegationsResponse, RedelegationsResponse, RewardsResponse, UnbondingResponse,
};
use super::validators::ValidatorsResponse;
use crate::query::{DerivedView, Dependency, ErrorInfo, Query, refresh_all};
use astra_core::{Balance, CoinAmount, Currency, DisplayValidator, StakingSummary};
use futures::future::BoxFuture;

/// A validator's claimable reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReward {
    pub validator_address: String,
    pub amount: CoinAmount,
}

/// Cache handles and derived views for the staking screens of one address.
///
/// Every accessor reads cached data only; call [`StakingStore::ensure_fetched`]
/// or [`StakingStore::refresh`] to load it.
pub struct StakingStore {
    address: String,
    currency: Currency,
    pub balances: Query<BalancesResponse>,
    pub delegations: Query<DelegationsResponse>,
    pub unbonding: Query<UnbondingResponse>,
    pub redelegations: Query<RedelegationsResponse>,
    pub rewards: Query<RewardsResponse>,
    pub validators: Query<ValidatorsResponse>,
    pub pool: Query<PoolResponse>,
    pub mint_params: Query<MintParamsResponse>,
    pub block_provision: Query<BlockProvisionResponse>,
    total_staked: DerivedView<Balance>,
    total_rewards: DerivedView<Balance>,
    total_unbonding: DerivedView<Balance>,
    chain_apr: DerivedView<f64>,
}

impl StakingStore {
    pub fn new(queries: &ChainQueries, address: &str) -> Self {
        let currency = queries.chain().stake_currency.clone();
        let denom = currency.coin_minimal_denom.clone();

        let delegations = queries.delegations(address);
        let rewards = queries.rewards(address);
        let unbonding = queries.unbonding_delegations(address);
        let pool = queries.pool();
        let mint_params = queries.mint_params();
        let block_provision = queries.block_provision();

        let total_staked = {
            let q = delegations.clone();
            let denom = denom.clone();
            DerivedView::new(vec![Box::new(q.clone())], move || {
                q.data().map(|d| d.total(&denom)).unwrap_or(0)
            })
        };
        let total_rewards = {
            let q = rewards.clone();
            let denom = denom.clone();
            DerivedView::new(vec![Box::new(q.clone())], move || {
                q.data().map(|r| r.total_of(&denom)).unwrap_or(0)
            })
        };
        let total_unbonding = {
            let q = unbonding.clone();
            DerivedView::new(vec![Box::new(q.clone())], move || {
                q.data().map(|u| u.total()).unwrap_or(0)
            })
        };
        let chain_apr = {
            let (pool, mint, provision) =
                (pool.clone(), mint_params.clone(), block_provision.clone());
            let deps: Vec<Box<dyn Dependency>> = vec![
                Box::new(pool.clone()),
                Box::new(mint.clone()),
                Box::new(provision.clone()),
            ];
            DerivedView::new(deps, move || {
                let bonded = pool.data().map(|p| p.pool.bonded_tokens).unwrap_or(0);
                let per_block = provision.data().map(|p| p.provision.amount).unwrap_or(0);
                let blocks = mint
                    .data()
                    .map(|m| m.blocks_per_year())
                    .unwrap_or(astra_core::DEFAULT_BLOCKS_PER_YEAR);
                astra_core::chain_apr(per_block, blocks, bonded)
            })
        };

        Self {
            address: address.to_string(),
            currency,
            balances: queries.balances(address),
            delegations,
            unbonding,
            redelegations: queries.redelegations(address),
            rewards,
            validators: queries.validators(),
            pool,
            mint_params,
            block_provision,
            total_staked,
            total_rewards,
            total_unbonding,
            chain_apr,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn stake_currency(&self) -> &Currency {
        &self.currency
    }

    /// Start background fetches for everything the staking screens show.
    pub fn ensure_fetched(&self) {
        self.balances.ensure_fetched();
        self.delegations.ensure_fetched();
        self.unbonding.ensure_fetched();
        self.redelegations.ensure_fetched();
        self.rewards.ensure_fetched();
        self.validators.ensure_fetched();
        self.pool.ensure_fetched();
        self.mint_params.ensure_fetched();
        self.block_provision.ensure_fetched();
    }

    /// Pull-to-refresh: balances, rewards, delegations and unbonding together.
    pub async fn refresh(&self) -> Result<(), ErrorInfo> {
        refresh_all(&[
            &self.balances,
            &self.rewards,
            &self.delegations,
            &self.unbonding,
        ])
        .await
    }

    /// Resolves when any of the derived totals may have changed.
    pub fn changed(&self) -> BoxFuture<'static, ()> {
        let futures = vec![
            self.total_staked.changed(),
            self.total_rewards.changed(),
            self.total_unbonding.changed(),
            self.chain_apr.changed(),
        ];
        Box::pin(async move {
            let _ = futures::future::select_all(futures).await;
        })
    }

    pub fn available(&self) -> CoinAmount {
        let denom = &self.currency.coin_minimal_denom;
        let amount = self
            .balances
            .data()
            .map(|b| b.amount_of(denom))
            .unwrap_or(0);
        self.currency.amount(amount)
    }

    pub fn total_staking_amount(&self) -> CoinAmount {
        self.currency.amount(*self.total_staked.get())
    }

    pub fn total_rewards(&self) -> CoinAmount {
        self.currency.amount(*self.total_rewards.get())
    }

    pub fn total_unbonding(&self) -> CoinAmount {
        self.currency.amount(*self.total_unbonding.get())
    }

    pub fn is_staking_to(&self, validator_address: &str) -> bool {
        self.delegations
            .data()
            .is_some_and(|d| d.is_staking_to(validator_address))
    }

    pub fn has_stake(&self) -> bool {
        self.total_staking_amount().is_positive()
    }

    pub fn has_unbonding(&self) -> bool {
        self.total_unbonding().is_positive()
    }

    pub fn chain_apr(&self) -> f64 {
        *self.chain_apr.get()
    }

    /// Delegator APR for one validator, if it is in the bonded set.
    pub fn validator_apr(&self, validator_address: &str) -> Option<f64> {
        let validators = self.validators.data()?;
        let validator = validators.find(validator_address)?;
        Some(astra_core::validator_apr(
            self.chain_apr(),
            validator.commission_rate(),
        ))
    }

    /// Bonded validators, highest APR first.
    pub fn display_validators(&self) -> Vec<DisplayValidator> {
        let chain_apr = self.chain_apr();
        let mut rows: Vec<DisplayValidator> = self
            .validators
            .data()
            .map(|v| v.validators.iter().map(|v| v.to_display(chain_apr)).collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| b.apr.total_cmp(&a.apr));
        rows
    }

    /// Validators whose reward is strictly above `dust`, largest first.
    pub fn withdrawable_rewards(&self, dust: Balance) -> Vec<PendingReward> {
        self.rewards
            .data()
            .map(|r| pending_rewards(&r, &self.currency, dust))
            .unwrap_or_default()
    }

    /// Default dust threshold in minimal units of the stake currency.
    pub fn default_reward_dust(&self) -> Balance {
        default_reward_dust(&self.currency)
    }

    pub fn summary(&self) -> StakingSummary {
        StakingSummary {
            available: self.available(),
            staked: self.total_staking_amount(),
            rewards: self.total_rewards(),
            unbonding: self.total_unbonding(),
            chain_apr: self.chain_apr(),
        }
    }
}

/// Rewards strictly above `dust`, largest first.
pub fn pending_rewards(
    rewards: &RewardsResponse,
    currency: &Currency,
    dust: Balance,
) -> Vec<PendingReward> {
    let mut pending: Vec<PendingReward> = rewards
        .rewards
        .iter()
        .filter_map(|r| {
            let amount = r.amount_of(&currency.coin_minimal_denom);
            (amount > dust).then(|| PendingReward {
                validator_address: r.validator_address.clone(),
                amount: currency.amount(amount),
            })
        })
        .collect();
    pending.sort_by(|a, b| b.amount.amount.cmp(&a.amount.amount));
    pending
}

/// The display dust threshold in minimal units of `currency`.
pub fn default_reward_dust(currency: &Currency) -> Balance {
    astra_core::parse_units(astra_core::DEFAULT_REWARD_DUST_DISPLAY, currency.coin_decimals)
        .unwrap_or(0)
}

/// Sum of a reward working set.
pub fn rewards_total(currency: &Currency, rewards: &[PendingReward]) -> CoinAmount {
    currency.amount(astra_core::total(rewards.iter().map(|r| r.amount.amount)))
}

impl std::fmt::Debug for StakingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakingStore")
            .field("address", &self.address)
            .field("currency", &self.currency.coin_denom)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryCache;
    use crate::registry::ChainRegistry;
    use crate::testing::MockTransport;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::sync::Arc;

    const ADDR: &str = "astra1me";
    const ASA: Balance = 1_000_000_000_000_000_000;

    fn setup() -> (Arc<MockTransport>, ChainQueries) {
        let transport = Arc::new(MockTransport::new());
        let chain = ChainRegistry::default().get("astra_11110-1").unwrap().clone();
        let queries = ChainQueries::new(QueryCache::new(transport.clone()), chain);
        (transport, queries)
    }

    fn dec(amount: Balance) -> String {
        format!("{}.000000000000000000", amount)
    }

    #[tokio::test]
    async fn test_reward_working_set_excludes_dust() {
        let (transport, queries) = setup();
        let store = StakingStore::new(&queries, ADDR);
        transport.respond(
            &store.rewards.request().url(),
            json!({"rewards": [
                {"validator_address": "v1", "reward": [{"denom": "aastra", "amount": dec(ASA / 5)}]},
                {"validator_address": "v2", "reward": [{"denom": "aastra", "amount": dec(ASA / 200)}]},
                {"validator_address": "v3", "reward": [{"denom": "aastra", "amount": dec(13 * ASA / 10)}]}
            ]}),
        );
        store.rewards.wait_fresh_response().await.unwrap();

        let dust = store.default_reward_dust();
        assert_eq!(dust, ASA / 100);
        let working = store.withdrawable_rewards(dust);
        let shown: Vec<String> = working.iter().map(|r| r.amount.to_dec_string()).collect();
        assert_eq!(shown, vec!["1.3", "0.2"]);
        assert_eq!(rewards_total(store.stake_currency(), &working).to_dec_string(), "1.5");
    }

    #[tokio::test]
    async fn test_chain_apr_from_params() {
        let (transport, queries) = setup();
        let store = StakingStore::new(&queries, ADDR);
        transport.respond(
            &store.pool.request().url(),
            json!({"pool": {"not_bonded_tokens": "0", "bonded_tokens": "5256000000"}}),
        );
        transport.respond(
            &store.mint_params.request().url(),
            json!({"params": {"mint_denom": "aastra", "blocks_per_year": "5256000"}}),
        );
        transport.respond(
            &store.block_provision.request().url(),
            json!({"provision": {"denom": "aastra", "amount": "100.000000000000000000"}}),
        );
        transport.respond(
            &store.validators.request().url(),
            json!({"validators": [{
                "operator_address": "astravaloper1a",
                "tokens": "1",
                "commission": {"commission_rates": {"rate": "0.100000000000000000"}}
            }]}),
        );

        assert_eq!(store.chain_apr(), 0.0);
        refresh_all(&[
            &store.pool,
            &store.mint_params,
            &store.block_provision,
            &store.validators,
        ])
        .await
        .unwrap();

        assert_relative_eq!(store.chain_apr(), 0.1);
        assert_relative_eq!(store.validator_apr("astravaloper1a").unwrap(), 0.09);
        assert!(store.validator_apr("astravaloper1zz").is_none());
        assert_eq!(store.display_validators().len(), 1);
    }

    #[tokio::test]
    async fn test_predicates_and_summary() {
        let (transport, queries) = setup();
        let store = StakingStore::new(&queries, ADDR);
        transport.respond(
            &store.balances.request().url(),
            json!({"balances": [{"denom": "aastra", "amount": ASA.to_string()}]}),
        );
        transport.respond(
            &store.delegations.request().url(),
            json!({"delegation_responses": [{
                "delegation": {"validator_address": "astravaloper1a"},
                "balance": {"denom": "aastra", "amount": (2 * ASA).to_string()}
            }]}),
        );
        transport.respond(
            &store.rewards.request().url(),
            json!({"rewards": []}),
        );
        transport.respond(
            &store.unbonding.request().url(),
            json!({"unbonding_responses": []}),
        );

        assert!(!store.has_stake());
        store.refresh().await.unwrap();

        assert!(store.has_stake());
        assert!(!store.has_unbonding());
        assert!(store.is_staking_to("astravaloper1a"));
        let summary = store.summary();
        assert_eq!(summary.total().unwrap().to_string(), "3 ASA");
    }

    #[tokio::test]
    async fn test_refresh_reports_failure_but_keeps_others() {
        let (transport, queries) = setup();
        let store = StakingStore::new(&queries, ADDR);
        transport.respond(
            &store.balances.request().url(),
            json!({"balances": [{"denom": "aastra", "amount": "5"}]}),
        );
        // rewards, delegations and unbonding fall through to 404.
        assert!(store.refresh().await.is_err());
        assert_eq!(store.available().amount, 5);
        assert!(store.delegations.error().is_some());
    }
}
