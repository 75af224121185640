//! Bech32 and hex address handling.
//!
//! Astra accounts have one 20-byte key hash shown two ways: bech32 with the
//! chain prefix on the Cosmos side and 0x-hex on the EVM side.

use crate::error::ValidationError;
use alloy_primitives::Address;
use bech32::{FromBase32, ToBase32, Variant};

/// Decode a bech32 address and check its prefix.
pub fn decode_bech32(address: &str, expected_prefix: &str) -> Result<Vec<u8>, ValidationError> {
    let invalid = || ValidationError::InvalidAddress(address.to_string());
    let (hrp, data, variant) = bech32::decode(address.trim()).map_err(|_| invalid())?;
    if hrp != expected_prefix || variant != Variant::Bech32 {
        return Err(invalid());
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    Ok(bytes)
}

/// Validate an account or operator address.
pub fn validate_bech32(address: &str, expected_prefix: &str) -> Result<(), ValidationError> {
    decode_bech32(address, expected_prefix).map(|_| ())
}

/// Encode raw key-hash bytes as bech32.
pub fn encode_bech32(prefix: &str, bytes: &[u8]) -> Result<String, ValidationError> {
    bech32::encode(prefix, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| ValidationError::InvalidAddress(e.to_string()))
}

/// Convert a bech32 account address into its EVM form.
pub fn bech32_to_evm(address: &str, prefix: &str) -> Result<Address, ValidationError> {
    let bytes = decode_bech32(address, prefix)?;
    if bytes.len() != 20 {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }
    Ok(Address::from_slice(&bytes))
}

/// Lowercase 0x-hex form of a bech32 account address.
pub fn bech32_to_hex(address: &str, prefix: &str) -> Result<String, ValidationError> {
    let bytes = decode_bech32(address, prefix)?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Convert a 0x-hex address into bech32.
pub fn hex_to_bech32(hex_address: &str, prefix: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidAddress(hex_address.to_string());
    let stripped = hex_address
        .strip_prefix("0x")
        .or_else(|| hex_address.strip_prefix("0X"))
        .unwrap_or(hex_address);
    let bytes = hex::decode(stripped).map_err(|_| invalid())?;
    if bytes.len() != 20 {
        return Err(invalid());
    }
    encode_bech32(prefix, &bytes)
}

/// Parse a 0x-hex EVM address.
pub fn parse_evm_address(value: &str) -> Result<Address, ValidationError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| ValidationError::InvalidAddress(value.to_string()))
}
