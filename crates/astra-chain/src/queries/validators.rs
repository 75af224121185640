//! Validator-set queries.

use super::{ChainQueries, de_balance, de_dec_ratio};
use crate::query::{Query, QueryRequest};
use astra_core::{Balance, DisplayValidator};
use serde::Deserialize;

/// Maximum validators requested in one page; the bonded set is far smaller.
const VALIDATOR_PAGE_LIMIT: u32 = 300;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommissionRates {
    #[serde(deserialize_with = "de_dec_ratio")]
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commission {
    pub commission_rates: CommissionRates,
}

/// A validator as returned by the staking module.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorInfo {
    pub operator_address: String,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub status: String,
    #[serde(deserialize_with = "de_balance")]
    pub tokens: Balance,
    #[serde(default)]
    pub description: ValidatorDescription,
    pub commission: Commission,
}

impl ValidatorInfo {
    pub fn commission_rate(&self) -> f64 {
        self.commission.commission_rates.rate
    }

    /// Display row with the given chain APR applied.
    pub fn to_display(&self, chain_apr: f64) -> DisplayValidator {
        DisplayValidator {
            operator_address: self.operator_address.clone(),
            moniker: self.description.moniker.clone(),
            commission: self.commission_rate(),
            jailed: self.jailed,
            tokens: self.tokens,
            apr: astra_core::validator_apr(chain_apr, self.commission_rate()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorsResponse {
    #[serde(default)]
    pub validators: Vec<ValidatorInfo>,
}

impl ValidatorsResponse {
    pub fn find(&self, operator_address: &str) -> Option<&ValidatorInfo> {
        self.validators
            .iter()
            .find(|v| v.operator_address == operator_address)
    }
}

impl ChainQueries {
    /// Bonded validator set.
    pub fn validators(&self) -> Query<ValidatorsResponse> {
        let request =
            QueryRequest::new(&self.chain().rest_url, "/cosmos/staking/v1beta1/validators")
                .param("status", "BOND_STATUS_BONDED")
                .param("pagination.limit", VALIDATOR_PAGE_LIMIT);
        self.cache().query(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "validators": [{
                "operator_address": "astravaloper1abc",
                "jailed": false,
                "status": "BOND_STATUS_BONDED",
                "tokens": "5000000000000000000000",
                "description": {"moniker": "Nebula", "website": ""},
                "commission": {"commission_rates": {
                    "rate": "0.050000000000000000",
                    "max_rate": "0.200000000000000000",
                    "max_change_rate": "0.010000000000000000"
                }}
            }],
            "pagination": {"next_key": null, "total": "1"}
        })
    }

    #[test]
    fn test_decode_validators() {
        let resp: ValidatorsResponse = serde_json::from_value(sample()).unwrap();
        let v = resp.find("astravaloper1abc").unwrap();
        assert_eq!(v.description.moniker, "Nebula");
        assert_eq!(v.tokens, 5_000_000_000_000_000_000_000);
        assert_relative_eq!(v.commission_rate(), 0.05);
        assert!(resp.find("astravaloper1zzz").is_none());
    }

    #[test]
    fn test_to_display_applies_commission() {
        let resp: ValidatorsResponse = serde_json::from_value(sample()).unwrap();
        let display = resp.validators[0].to_display(0.20);
        assert_relative_eq!(display.apr, 0.19);
        assert_eq!(display.display_name(), "Nebula");
    }
}
