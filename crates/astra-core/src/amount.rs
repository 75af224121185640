//! Fixed-point conversion between decimal strings and minimal-denomination integers.
//!
//! Conversions never go through floating point. Excess fractional digits are
//! truncated, so a converted amount can never exceed what the user typed.

use crate::types::Balance;
use thiserror::Error;

/// Number of fractional digits in a Cosmos `Dec` string.
pub const DEC_PRECISION: u8 = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid amount: {0}")]
    Invalid(String),

    #[error("Amount overflows: {0}")]
    Overflow(String),
}

/// Convert a user-entered decimal string into minimal-denomination units.
///
/// `"12.5"` with 18 decimals yields `12_500_000_000_000_000_000`.
pub fn parse_units(value: &str, decimals: u8) -> Result<Balance, AmountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AmountError::Empty);
    }

    let (integer_part, fraction_part) = match value.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (value, ""),
    };

    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(AmountError::Invalid(value.to_string()));
    }
    if !integer_part.chars().all(|c| c.is_ascii_digit())
        || !fraction_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountError::Invalid(value.to_string()));
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| AmountError::Overflow(value.to_string()))?;

    let integer: Balance = if integer_part.is_empty() {
        0
    } else {
        integer_part
            .parse()
            .map_err(|_| AmountError::Overflow(value.to_string()))?
    };

    // Truncate, never round: extra digits beyond `decimals` are dropped.
    let kept: String = fraction_part.chars().take(decimals as usize).collect();
    let fraction: Balance = if kept.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", kept, width = decimals as usize);
        padded
            .parse()
            .map_err(|_| AmountError::Overflow(value.to_string()))?
    };

    integer
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(|| AmountError::Overflow(value.to_string()))
}

/// Render minimal-denomination units as a decimal string, trimming trailing zeros.
pub fn format_units(amount: Balance, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return amount.to_string();
    };

    let integer = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return integer.to_string();
    }

    let fraction = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", integer, fraction.trim_end_matches('0'))
}

/// Parse a Cosmos `Dec` string (e.g., reward amounts "1234.500000000000000000")
/// into whole minimal units, dropping the sub-unit fraction.
pub fn parse_dec_units(value: &str) -> Result<Balance, AmountError> {
    let value = value.trim();
    let (integer_part, _) = split_dec(value)?;
    if integer_part.is_empty() {
        return Ok(0);
    }
    integer_part
        .parse()
        .map_err(|_| AmountError::Overflow(value.to_string()))
}

/// Parse a Cosmos `Dec` string as a ratio (e.g., commission "0.050000000000000000").
pub fn parse_dec_ratio(value: &str) -> Result<f64, AmountError> {
    let value = value.trim();
    split_dec(value)?;
    value
        .parse::<f64>()
        .map_err(|_| AmountError::Invalid(value.to_string()))
}

/// Split and validate a `Dec` string without scaling it.
fn split_dec(value: &str) -> Result<(&str, &str), AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    let (integer, fraction) = value.split_once('.').unwrap_or((value, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (integer.is_empty() && fraction.is_empty())
        || !digits(integer)
        || !digits(fraction)
        || fraction.len() > DEC_PRECISION as usize
    {
        return Err(AmountError::Invalid(value.to_string()));
    }
    Ok((integer, fraction))
}
