//! Chain parameter queries used for APR and fee computation.

use super::{ApiDecCoin, ChainQueries, de_balance, de_dec_balance};
use crate::query::{Query, QueryRequest};
use astra_core::Balance;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Pool {
    #[serde(deserialize_with = "de_balance")]
    pub bonded_tokens: Balance,
    #[serde(deserialize_with = "de_balance")]
    pub not_bonded_tokens: Balance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolResponse {
    pub pool: Pool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MintParams {
    #[serde(default)]
    pub mint_denom: String,
    #[serde(default, deserialize_with = "de_balance")]
    pub blocks_per_year: Balance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MintParamsResponse {
    pub params: MintParams,
}

impl MintParamsResponse {
    /// Blocks per year, falling back to the ~6s block default when unset.
    pub fn blocks_per_year(&self) -> u64 {
        match u64::try_from(self.params.blocks_per_year) {
            Ok(0) | Err(_) => astra_core::DEFAULT_BLOCKS_PER_YEAR,
            Ok(blocks) => blocks,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockProvisionResponse {
    pub provision: ApiDecCoin,
}

/// EIP-1559 fee market parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeMarketParams {
    #[serde(default)]
    pub no_base_fee: bool,
    #[serde(default, deserialize_with = "de_balance")]
    pub base_fee: Balance,
    /// Whole minimal units; a fractional minimum price truncates to zero.
    #[serde(default, deserialize_with = "de_dec_balance")]
    pub min_gas_price: Balance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeMarketResponse {
    pub params: FeeMarketParams,
}

impl FeeMarketResponse {
    /// On-chain suggested gas price, if the fee market publishes a positive one.
    pub fn suggested_gas_price(&self) -> Option<Balance> {
        let params = &self.params;
        let base_fee = if params.no_base_fee { 0 } else { params.base_fee };
        let price = base_fee.max(params.min_gas_price);
        (price > 0).then_some(price)
    }
}

impl ChainQueries {
    pub fn pool(&self) -> Query<PoolResponse> {
        self.cache().query(QueryRequest::new(
            &self.chain().rest_url,
            "/cosmos/staking/v1beta1/pool",
        ))
    }

    pub fn mint_params(&self) -> Query<MintParamsResponse> {
        self.cache()
            .query(QueryRequest::new(&self.chain().rest_url, "/astra/mint/v1/params"))
    }

    pub fn block_provision(&self) -> Query<BlockProvisionResponse> {
        self.cache().query(QueryRequest::new(
            &self.chain().rest_url,
            "/astra/mint/v1/block_provision",
        ))
    }

    pub fn fee_market(&self) -> Query<FeeMarketResponse> {
        self.cache().query(QueryRequest::new(
            &self.chain().rest_url,
            "/ethermint/feemarket/v1/params",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fee_market(base_fee: &str, min_gas_price: &str, no_base_fee: bool) -> FeeMarketResponse {
        serde_json::from_value(json!({"params": {
            "no_base_fee": no_base_fee,
            "base_fee_change_denominator": 8,
            "elasticity_multiplier": 2,
            "enable_height": "0",
            "base_fee": base_fee,
            "min_gas_price": min_gas_price,
            "min_gas_multiplier": "0.500000000000000000"
        }}))
        .unwrap()
    }

    #[test]
    fn test_suggested_gas_price_uses_larger_value() {
        let fm = fee_market("1000000000", "2000000000.000000000000000000", false);
        assert_eq!(fm.suggested_gas_price(), Some(2_000_000_000));
        let fm = fee_market("3000000000", "0.000000000000000000", false);
        assert_eq!(fm.suggested_gas_price(), Some(3_000_000_000));
    }

    #[test]
    fn test_suggested_gas_price_absent_when_zero() {
        let fm = fee_market("0", "0.000000000000000000", false);
        assert_eq!(fm.suggested_gas_price(), None);
        let fm = fee_market("5", "0.000000000000000000", true);
        assert_eq!(fm.suggested_gas_price(), None);
    }

    #[test]
    fn test_mint_params_blocks_per_year() {
        let params: MintParamsResponse = serde_json::from_value(json!({
            "params": {"mint_denom": "aastra", "blocks_per_year": "6311520"}
        }))
        .unwrap();
        assert_eq!(params.blocks_per_year(), 6_311_520);

        let params: MintParamsResponse =
            serde_json::from_value(json!({"params": {"mint_denom": "aastra"}})).unwrap();
        assert_eq!(params.blocks_per_year(), astra_core::DEFAULT_BLOCKS_PER_YEAR);
    }

    #[test]
    fn test_pool_and_provision() {
        let pool: PoolResponse = serde_json::from_value(json!({
            "pool": {"not_bonded_tokens": "10", "bonded_tokens": "5000"}
        }))
        .unwrap();
        assert_eq!(pool.pool.bonded_tokens, 5000);

        let provision: BlockProvisionResponse = serde_json::from_value(json!({
            "provision": {"denom": "aastra", "amount": "3170979198376458650.431253170979198376"}
        }))
        .unwrap();
        assert_eq!(provision.provision.amount, 3_170_979_198_376_458_650);
    }
}
