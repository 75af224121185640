//! Delegator staking queries: delegations, unbonding, redelegations and rewards.

use super::{ApiCoin, ApiDecCoin, ChainQueries, de_balance};
use crate::query::{Query, QueryRequest};
use astra_core::Balance;
use serde::Deserialize;

/// One delegation, normalized across response shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub validator_address: String,
    pub amount: Balance,
    /// `None` when the endpoint omits it; the amount is then in the stake currency.
    pub denom: Option<String>,
}

/// Delegations of one address.
///
/// Accepts the staking module shape (`delegation_responses`) as well as the
/// compact `{delegations: [{validator, amount}], total}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDelegations")]
pub struct DelegationsResponse {
    pub delegations: Vec<Delegation>,
}

impl DelegationsResponse {
    /// Sum of delegated amounts in `stake_denom`.
    pub fn total(&self, stake_denom: &str) -> Balance {
        astra_core::total(
            self.delegations
                .iter()
                .filter(|d| d.denom.as_deref().is_none_or(|denom| denom == stake_denom))
                .map(|d| d.amount),
        )
    }

    pub fn is_staking_to(&self, validator_address: &str) -> bool {
        self.delegations
            .iter()
            .any(|d| d.validator_address == validator_address && d.amount > 0)
    }

    pub fn amount_to(&self, validator_address: &str) -> Balance {
        astra_core::total(
            self.delegations
                .iter()
                .filter(|d| d.validator_address == validator_address)
                .map(|d| d.amount),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDelegations {
    Module {
        delegation_responses: Vec<DelegationResponse>,
    },
    Compact {
        delegations: Vec<CompactDelegation>,
    },
}

#[derive(Deserialize)]
struct DelegationResponse {
    delegation: DelegationBody,
    balance: ApiCoin,
}

#[derive(Deserialize)]
struct DelegationBody {
    validator_address: String,
}

#[derive(Deserialize)]
struct CompactDelegation {
    validator: String,
    #[serde(deserialize_with = "de_balance")]
    amount: Balance,
}

impl From<RawDelegations> for DelegationsResponse {
    fn from(raw: RawDelegations) -> Self {
        let delegations = match raw {
            RawDelegations::Module {
                delegation_responses,
            } => delegation_responses
                .into_iter()
                .map(|r| Delegation {
                    validator_address: r.delegation.validator_address,
                    amount: r.balance.amount,
                    denom: Some(r.balance.denom),
                })
                .collect(),
            RawDelegations::Compact { delegations } => delegations
                .into_iter()
                .map(|d| Delegation {
                    validator_address: d.validator,
                    amount: d.amount,
                    denom: None,
                })
                .collect(),
        };
        Self { delegations }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnbondingEntry {
    #[serde(default)]
    pub creation_height: String,
    #[serde(default)]
    pub completion_time: String,
    #[serde(deserialize_with = "de_balance")]
    pub balance: Balance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnbondingDelegation {
    pub validator_address: String,
    #[serde(default)]
    pub entries: Vec<UnbondingEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnbondingResponse {
    #[serde(default)]
    pub unbonding_responses: Vec<UnbondingDelegation>,
}

impl UnbondingResponse {
    /// Sum of all pending unbonding entries.
    pub fn total(&self) -> Balance {
        astra_core::total(
            self.unbonding_responses
                .iter()
                .flat_map(|u| u.entries.iter())
                .map(|e| e.balance),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedelegationBody {
    pub validator_src_address: String,
    pub validator_dst_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedelegationEntryInfo {
    #[serde(default)]
    pub completion_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedelegationEntry {
    pub redelegation_entry: RedelegationEntryInfo,
    #[serde(deserialize_with = "de_balance")]
    pub balance: Balance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Redelegation {
    pub redelegation: RedelegationBody,
    #[serde(default)]
    pub entries: Vec<RedelegationEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedelegationsResponse {
    #[serde(default)]
    pub redelegation_responses: Vec<Redelegation>,
}

impl RedelegationsResponse {
    /// Whether a redelegation into `validator_address` is still maturing.
    ///
    /// Such stake cannot be redelegated again until it completes.
    pub fn is_redelegating_to(&self, validator_address: &str) -> bool {
        self.redelegation_responses.iter().any(|r| {
            r.redelegation.validator_dst_address == validator_address && !r.entries.is_empty()
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorReward {
    pub validator_address: String,
    #[serde(default)]
    pub reward: Vec<ApiDecCoin>,
}

impl ValidatorReward {
    pub fn amount_of(&self, denom: &str) -> Balance {
        super::amount_of(
            self.reward.iter().map(|c| (c.denom.as_str(), c.amount)),
            denom,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardsResponse {
    #[serde(default)]
    pub rewards: Vec<ValidatorReward>,
    #[serde(default)]
    pub total: Vec<ApiDecCoin>,
}

impl RewardsResponse {
    /// Total rewards in `denom`, summed per validator.
    pub fn total_of(&self, denom: &str) -> Balance {
        astra_core::total(self.rewards.iter().map(|r| r.amount_of(denom)))
    }
}

impl ChainQueries {
    pub fn delegations(&self, address: &str) -> Query<DelegationsResponse> {
        let request = QueryRequest::new(
            &self.chain().rest_url,
            &format!("/cosmos/staking/v1beta1/delegations/{}", address),
        )
        .require_value("address", address);
        self.cache().query(request)
    }

    pub fn unbonding_delegations(&self, address: &str) -> Query<UnbondingResponse> {
        let request = QueryRequest::new(
            &self.chain().rest_url,
            &format!(
                "/cosmos/staking/v1beta1/delegators/{}/unbonding_delegations",
                address
            ),
        )
        .require_value("address", address);
        self.cache().query(request)
    }

    pub fn redelegations(&self, address: &str) -> Query<RedelegationsResponse> {
        let request = QueryRequest::new(
            &self.chain().rest_url,
            &format!("/cosmos/staking/v1beta1/delegators/{}/redelegations", address),
        )
        .require_value("address", address);
        self.cache().query(request)
    }

    pub fn rewards(&self, address: &str) -> Query<RewardsResponse> {
        let request = QueryRequest::new(
            &self.chain().rest_url,
            &format!("/cosmos/distribution/v1beta1/delegators/{}/rewards", address),
        )
        .require_value("address", address);
        self.cache().query(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_shape() {
        let resp: DelegationsResponse = serde_json::from_value(json!({
            "delegation_responses": [{
                "delegation": {
                    "delegator_address": "astra1me",
                    "validator_address": "astravaloper1a",
                    "shares": "1000.000000000000000000"
                },
                "balance": {"denom": "aastra", "amount": "1000"}
            }],
            "pagination": {"next_key": null, "total": "1"}
        }))
        .unwrap();
        assert_eq!(resp.total("aastra"), 1000);
        assert_eq!(resp.total("other"), 0);
        assert!(resp.is_staking_to("astravaloper1a"));
    }

    #[test]
    fn test_compact_shape() {
        let resp: DelegationsResponse = serde_json::from_value(json!({
            "delegations": [{"validator": "valX", "amount": "1000000"}],
            "total": "1000000"
        }))
        .unwrap();
        assert_eq!(resp.total("aastra"), 1_000_000);
        assert!(resp.is_staking_to("valX"));
        assert!(!resp.is_staking_to("valY"));
        assert_eq!(resp.amount_to("valX"), 1_000_000);
    }

    #[test]
    fn test_zero_delegation_is_not_staking() {
        let resp: DelegationsResponse = serde_json::from_value(json!({
            "delegations": [{"validator": "valX", "amount": "0"}]
        }))
        .unwrap();
        assert!(!resp.is_staking_to("valX"));
    }

    #[test]
    fn test_unbonding_total() {
        let resp: UnbondingResponse = serde_json::from_value(json!({
            "unbonding_responses": [
                {"validator_address": "v1", "entries": [
                    {"creation_height": "10", "completion_time": "2026-01-01T00:00:00Z",
                     "initial_balance": "500", "balance": "400"},
                    {"creation_height": "11", "completion_time": "2026-01-02T00:00:00Z",
                     "initial_balance": "100", "balance": "100"}
                ]},
                {"validator_address": "v2", "entries": []}
            ]
        }))
        .unwrap();
        assert_eq!(resp.total(), 500);
    }

    #[test]
    fn test_redelegation_in_progress() {
        let resp: RedelegationsResponse = serde_json::from_value(json!({
            "redelegation_responses": [{
                "redelegation": {
                    "delegator_address": "astra1me",
                    "validator_src_address": "v1",
                    "validator_dst_address": "v2",
                    "entries": []
                },
                "entries": [{
                    "redelegation_entry": {"completion_time": "2026-01-01T00:00:00Z"},
                    "balance": "10"
                }]
            }]
        }))
        .unwrap();
        assert!(resp.is_redelegating_to("v2"));
        assert!(!resp.is_redelegating_to("v1"));
    }

    #[test]
    fn test_rewards_total() {
        let resp: RewardsResponse = serde_json::from_value(json!({
            "rewards": [
                {"validator_address": "v1", "reward": [{"denom": "aastra", "amount": "200.5"}]},
                {"validator_address": "v2", "reward": []},
                {"validator_address": "v3", "reward": [{"denom": "aastra", "amount": "1300.9"}]}
            ],
            "total": [{"denom": "aastra", "amount": "1501.4"}]
        }))
        .unwrap();
        assert_eq!(resp.total_of("aastra"), 1500);
        assert_eq!(resp.rewards[1].amount_of("aastra"), 0);
    }
}
