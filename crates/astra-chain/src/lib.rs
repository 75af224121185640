//! Chain access for the Astra wallet.
//!
//! - `query`: the reactive cache (single-flight fetches, generations, derived views, paging)
//! - `queries`: typed REST and indexer endpoints on top of the cache
//! - `transactions` and `gas`: validating, building, estimating and sending transactions

pub mod address;
pub mod client;
pub mod error;
pub mod gas;
pub mod queries;
pub mod query;
pub mod registry;
pub mod transactions;

#[cfg(test)]
mod testing;

pub use client::{RestClient, Transport};
pub use error::*;
pub use gas::{
    AllowanceEstimator, ApprovalEstimate, EvmCallEstimator, Fee, GasConfig, GasEstimate,
    GasEstimator, Simulator,
};
pub use queries::ChainQueries;
pub use queries::staking_store::{PendingReward, StakingStore};
pub use query::{ErrorInfo, Query, QueryCache, QueryRequest};
pub use registry::{ChainInfo, ChainRegistry};
pub use transactions::{
    SendHooks, Signer, TransactionBuilder, TransactionIntent, TransactionLifecycleStore,
    TransactionService, TxResult,
};
