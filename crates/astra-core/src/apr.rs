//! Staking math used by the derived views.

use crate::types::Balance;

/// Default blocks per year when the mint params do not report one (~6s blocks).
pub const DEFAULT_BLOCKS_PER_YEAR: u64 = 5_256_000;

/// Default minimum reward a validator must hold before it is claimed: 0.01 in display units.
pub const DEFAULT_REWARD_DUST_DISPLAY: &str = "0.01";

/// Calculate the chain-wide staking APR.
///
/// Formula:
/// ```text
/// APR = (blockProvision * blocksPerYear) / bondedTokens
/// ```
///
/// Returns 0 when either the bonded tokens or the block provision is zero.
///
/// # Returns
/// APR as a decimal (e.g., 0.15 for 15%)
pub fn chain_apr(block_provision: Balance, blocks_per_year: u64, bonded_tokens: Balance) -> f64 {
    if bonded_tokens == 0 || block_provision == 0 {
        return 0.0;
    }
    let annual_provision = block_provision as f64 * blocks_per_year as f64;
    annual_provision / bonded_tokens as f64
}

/// Calculate delegator APR for a validator (after commission).
///
/// # Arguments
/// * `chain_apr` - Chain-wide APR as a decimal
/// * `commission` - Validator commission as decimal (0.0 to 1.0)
pub fn validator_apr(chain_apr: f64, commission: f64) -> f64 {
    let commission = commission.clamp(0.0, 1.0);
    chain_apr * (1.0 - commission)
}

/// Zero-initialized sum over per-validator amounts; saturates instead of overflowing.
pub fn total<I>(amounts: I) -> Balance
where
    I: IntoIterator<Item = Balance>,
{
    amounts.into_iter().fold(0, Balance::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_chain_apr_zero_bonded() {
        assert_eq!(chain_apr(1000, DEFAULT_BLOCKS_PER_YEAR, 0), 0.0);
    }

    #[test]
    fn test_chain_apr_zero_provision() {
        assert_eq!(chain_apr(0, DEFAULT_BLOCKS_PER_YEAR, 1_000_000), 0.0);
    }

    #[test]
    fn test_chain_apr_calculation() {
        // 10 tokens per block, 1000 blocks per year, 100_000 bonded -> 10%
        let apr = chain_apr(10, 1000, 100_000);
        assert_relative_eq!(apr, 0.1);
    }

    #[test]
    fn test_validator_apr_commission() {
        assert_relative_eq!(validator_apr(0.2, 0.1), 0.18);
        assert_relative_eq!(validator_apr(0.2, 0.0), 0.2);
        assert_eq!(validator_apr(0.2, 1.0), 0.0);
    }

    #[test]
    fn test_validator_apr_clamps_commission() {
        assert_eq!(validator_apr(0.2, 1.5), 0.0);
        assert_relative_eq!(validator_apr(0.2, -0.5), 0.2);
    }

    #[test]
    fn test_total_is_zero_initialized() {
        assert_eq!(total(Vec::new()), 0);
        assert_eq!(total(vec![1, 2, 3]), 6);
    }

    #[test]
    fn test_total_saturates() {
        assert_eq!(total(vec![Balance::MAX, 1]), Balance::MAX);
    }
}
