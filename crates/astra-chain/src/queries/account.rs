//! Account balance queries.

use super::{ApiCoin, ChainQueries, amount_of};
use crate::query::{Query, QueryRequest};
use astra_core::Balance;
use serde::Deserialize;

/// Spendable balances of an account.
#[derive(Debug, Clone, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub balances: Vec<ApiCoin>,
}

impl BalancesResponse {
    pub fn amount_of(&self, denom: &str) -> Balance {
        amount_of(
            self.balances.iter().map(|c| (c.denom.as_str(), c.amount)),
            denom,
        )
    }
}

impl ChainQueries {
    /// Spendable balances for a bech32 address.
    pub fn balances(&self, address: &str) -> Query<BalancesResponse> {
        let request = QueryRequest::new(
            &self.chain().rest_url,
            &format!("/cosmos/bank/v1beta1/balances/{}", address),
        )
        .param("pagination.limit", 1000)
        .require_value("address", address);
        self.cache().query(request)
    }

    /// Spendable amount of the chain's stake currency, if balances are cached.
    pub fn stake_balance(&self, address: &str) -> Option<Balance> {
        let denom = &self.chain().stake_currency.coin_minimal_denom;
        self.balances(address).data().map(|b| b.amount_of(denom))
    }
}
