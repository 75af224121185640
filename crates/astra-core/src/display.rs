//! Display types for UI frontends.
//!
//! These are plain snapshots assembled from the derived views so a front end
//! can render them without holding on to cache handles.

use serde::{Deserialize, Serialize};

use crate::types::CoinAmount;

/// Validator display information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayValidator {
    /// Bech32 operator address (astravaloper...).
    pub operator_address: String,
    /// Moniker from the validator description.
    pub moniker: String,
    /// Commission rate as a fraction (0.0 to 1.0).
    pub commission: f64,
    /// Whether the validator is jailed.
    pub jailed: bool,
    /// Bonded tokens in minimal units.
    pub tokens: u128,
    /// Estimated APR for delegators (after commission).
    pub apr: f64,
}

impl DisplayValidator {
    /// Returns the APR as a percentage.
    pub fn apr_percent(&self) -> f64 {
        self.apr * 100.0
    }

    /// Returns the moniker or a truncated address if the moniker is empty.
    pub fn display_name(&self) -> &str {
        if !self.moniker.is_empty() {
            return &self.moniker;
        }
        if self.operator_address.len() > 16 {
            &self.operator_address[..16]
        } else {
            &self.operator_address
        }
    }
}

/// Summary view of an account's staking position.
#[derive(Debug, Clone, PartialEq)]
pub struct StakingSummary {
    pub available: CoinAmount,
    pub staked: CoinAmount,
    pub rewards: CoinAmount,
    pub unbonding: CoinAmount,
    /// Chain-wide APR as a decimal.
    pub chain_apr: f64,
}

impl StakingSummary {
    /// Available + staked + rewards + unbonding, in the stake currency.
    pub fn total(&self) -> Option<CoinAmount> {
        self.available
            .checked_add(&self.staked)?
            .checked_add(&self.rewards)?
            .checked_add(&self.unbonding)
    }

    pub fn has_stake(&self) -> bool {
        self.staked.is_positive()
    }

    pub fn has_unbonding(&self) -> bool {
        self.unbonding.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn make_validator() -> DisplayValidator {
        DisplayValidator {
            operator_address: "astravaloper1qqqqqqqqqqqqqqqqqqqq".to_string(),
            moniker: String::new(),
            commission: 0.05,
            jailed: false,
            tokens: 1_000,
            apr: 0.12,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_address() {
        let v = make_validator();
        assert_eq!(v.display_name(), "astravaloper1qqq");
    }

    #[test]
    fn test_display_name_uses_moniker() {
        let mut v = make_validator();
        v.moniker = "Astra Node".to_string();
        assert_eq!(v.display_name(), "Astra Node");
    }

    #[test]
    fn test_apr_percent() {
        let v = make_validator();
        approx::assert_relative_eq!(v.apr_percent(), 12.0);
    }

    #[test]
    fn test_summary_total_and_predicates() {
        let asa = Currency::new("ASA", "aastra", 6);
        let summary = StakingSummary {
            available: asa.amount(1),
            staked: asa.amount(2),
            rewards: asa.amount(3),
            unbonding: asa.zero(),
            chain_apr: 0.1,
        };
        assert_eq!(summary.total().map(|t| t.amount), Some(6));
        assert!(summary.has_stake());
        assert!(!summary.has_unbonding());
    }
}
