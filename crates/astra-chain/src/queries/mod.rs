//! Chain query implementations.
//!
//! Each submodule adds typed responses and the `ChainQueries` constructors for
//! one family of endpoints. Constructors only build cache handles; fetching is
//! up to the caller (`ensure_fetched` / `wait_fresh_response`).

pub mod account;
pub mod assets;
pub mod history;
pub mod params;
pub mod staking;
pub mod staking_store;
pub mod validators;

use crate::query::QueryCache;
use crate::registry::ChainInfo;
use astra_core::{Balance, Coin};
use serde::{Deserialize, Deserializer};

/// Query constructors for one chain, sharing one cache.
#[derive(Clone)]
pub struct ChainQueries {
    cache: QueryCache,
    chain: ChainInfo,
}

impl ChainQueries {
    pub fn new(cache: QueryCache, chain: ChainInfo) -> Self {
        Self { cache, chain }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn chain(&self) -> &ChainInfo {
        &self.chain
    }
}

/// Coin as returned by REST endpoints: amount is an integer string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiCoin {
    pub denom: String,
    #[serde(deserialize_with = "de_balance")]
    pub amount: Balance,
}

impl From<&ApiCoin> for Coin {
    fn from(c: &ApiCoin) -> Self {
        Coin::new(c.denom.clone(), c.amount)
    }
}

/// DecCoin as returned by distribution endpoints: amount has 18 fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiDecCoin {
    pub denom: String,
    /// Whole minimal units; the sub-unit fraction is dropped.
    #[serde(deserialize_with = "de_dec_balance")]
    pub amount: Balance,
}

/// Sum the amounts of one denom.
pub fn amount_of<'a, I>(coins: I, denom: &str) -> Balance
where
    I: IntoIterator<Item = (&'a str, Balance)>,
{
    astra_core::total(
        coins
            .into_iter()
            .filter(|(d, _)| *d == denom)
            .map(|(_, amount)| amount),
    )
}

/// Integer amount encoded as a JSON string (or number).
pub(crate) fn de_balance<'de, D>(deserializer: D) -> Result<Balance, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Num(n) => Ok(n as Balance),
    }
}

/// Height or counter encoded as a JSON string (or number).
pub(crate) fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_balance(deserializer)?;
    u64::try_from(value).map_err(serde::de::Error::custom)
}

/// Cosmos `Dec` string truncated to whole minimal units.
pub(crate) fn de_dec_balance<'de, D>(deserializer: D) -> Result<Balance, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    astra_core::parse_dec_units(&s).map_err(serde::de::Error::custom)
}

/// Cosmos `Dec` string as a ratio.
pub(crate) fn de_dec_ratio<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Ok(0.0);
    }
    astra_core::parse_dec_ratio(&s).map_err(serde::de::Error::custom)
}
