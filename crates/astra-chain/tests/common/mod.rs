//! Shared fixtures for integration tests.

#![allow(dead_code)]

use astra_chain::{ChainError, ChainInfo, ChainQueries, QueryCache, Transport};
use astra_core::Currency;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Serves scripted JSON by exact URL. The last reply of a queue keeps being
/// served; unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(body);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> Result<Value, ChainError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(url).ok_or_else(|| ChainError::Status {
            status: 404,
            url: url.to_string(),
        })?;
        let body = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        body.ok_or_else(|| ChainError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

/// `astra_11110-1` with a 6-decimal stake currency.
pub fn test_chain() -> ChainInfo {
    let currency = Currency::new("ASA", "aastra", 6);
    ChainInfo {
        chain_id: "astra_11110-1".to_string(),
        chain_name: "Astra".to_string(),
        rest_url: "http://rest.test".to_string(),
        indexer_url: "http://indexer.test".to_string(),
        nft_hub_url: "http://nft.test".to_string(),
        explorer_url: "http://explorer.test".to_string(),
        evm_chain_id: 11110,
        bech32_prefix: "astra".to_string(),
        stake_currency: currency.clone(),
        fee_currencies: vec![currency],
    }
}

/// Route chain logs into the test harness; `RUST_LOG` overrides the default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("astra_chain=debug,info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn setup() -> (Arc<ScriptedTransport>, ChainQueries) {
    init_tracing();
    let transport = ScriptedTransport::new();
    let queries = ChainQueries::new(QueryCache::new(transport.clone()), test_chain());
    (transport, queries)
}
