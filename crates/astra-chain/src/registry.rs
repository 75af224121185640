//! Chain registry: static per-chain configuration.
//!
//! - REST (LCD) endpoints: balances, staking, distribution, mint, fee market
//! - Indexer endpoints: transaction history, token lists
//! - NFT hub: NFT collections
//! - Explorer: deep links for broadcast transactions

use crate::error::ChainError;
use astra_core::Currency;
use std::collections::HashMap;

/// Immutable chain metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainInfo {
    /// Cosmos chain id (e.g., "astra_11110-1").
    pub chain_id: String,
    pub chain_name: String,
    /// REST (LCD) base URL.
    pub rest_url: String,
    /// Transaction indexer base URL.
    pub indexer_url: String,
    /// NFT hub base URL.
    pub nft_hub_url: String,
    /// Block explorer base URL.
    pub explorer_url: String,
    /// EIP-155 chain id of the EVM side.
    pub evm_chain_id: u64,
    /// Bech32 human-readable prefix for account addresses.
    pub bech32_prefix: String,
    pub stake_currency: Currency,
    pub fee_currencies: Vec<Currency>,
}

impl ChainInfo {
    /// Bech32 prefix for validator operator addresses.
    pub fn validator_prefix(&self) -> String {
        format!("{}valoper", self.bech32_prefix)
    }

    /// Primary fee currency, falling back to the stake currency.
    pub fn fee_currency(&self) -> &Currency {
        self.fee_currencies.first().unwrap_or(&self.stake_currency)
    }

    /// Look up a currency by its minimal denom.
    pub fn find_currency(&self, minimal_denom: &str) -> Option<&Currency> {
        std::iter::once(&self.stake_currency)
            .chain(self.fee_currencies.iter())
            .find(|c| c.coin_minimal_denom == minimal_denom)
    }

    /// Block-explorer link for a transaction hash.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

fn astra_currency() -> Currency {
    Currency::new("ASA", "aastra", 18)
}

/// Built-in chain definitions.
pub fn builtin_chains() -> Vec<ChainInfo> {
    vec![
        ChainInfo {
            chain_id: "astra_11110-1".to_string(),
            chain_name: "Astra".to_string(),
            rest_url: "https://api.astranaut.io".to_string(),
            indexer_url: "https://explorer-api.astranaut.io".to_string(),
            nft_hub_url: "https://nft-api.astranaut.io".to_string(),
            explorer_url: "https://explorer.astranaut.io".to_string(),
            evm_chain_id: 11110,
            bech32_prefix: "astra".to_string(),
            stake_currency: astra_currency(),
            fee_currencies: vec![astra_currency()],
        },
        ChainInfo {
            chain_id: "astra_11115-1".to_string(),
            chain_name: "Astra Testnet".to_string(),
            rest_url: "https://api.astranaut.dev".to_string(),
            indexer_url: "https://explorer-api.astranaut.dev".to_string(),
            nft_hub_url: "https://nft-api.astranaut.dev".to_string(),
            explorer_url: "https://explorer.astranaut.dev".to_string(),
            evm_chain_id: 11115,
            bech32_prefix: "astra".to_string(),
            stake_currency: astra_currency(),
            fee_currencies: vec![astra_currency()],
        },
    ]
}

/// Lookup table of known chains. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<String, ChainInfo>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new(builtin_chains())
    }
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainInfo>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|c| (c.chain_id.clone(), c))
                .collect(),
        }
    }

    /// Get the chain info for a chain id.
    pub fn get(&self, chain_id: &str) -> Result<&ChainInfo, ChainError> {
        self.chains
            .get(chain_id)
            .ok_or_else(|| ChainError::UnknownChain(chain_id.to_string()))
    }

    /// Replace the REST base URL of a chain.
    pub fn with_rest_url(mut self, chain_id: &str, url: &str) -> Result<Self, ChainError> {
        let chain = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| ChainError::UnknownChain(chain_id.to_string()))?;
        tracing::info!("Using custom REST endpoint for {}: {}", chain_id, url);
        chain.rest_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Replace the indexer base URL of a chain.
    pub fn with_indexer_url(mut self, chain_id: &str, url: &str) -> Result<Self, ChainError> {
        let chain = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| ChainError::UnknownChain(chain_id.to_string()))?;
        tracing::info!("Using custom indexer endpoint for {}: {}", chain_id, url);
        chain.indexer_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Block-explorer link for a transaction hash on a chain.
    pub fn explorer_tx_url(&self, chain_id: &str, tx_hash: &str) -> Result<String, ChainError> {
        Ok(self.get(chain_id)?.explorer_tx_url(tx_hash))
    }

    /// All known chain ids, sorted.
    pub fn chain_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
