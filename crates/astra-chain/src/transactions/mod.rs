//! Transaction intents, building, fee estimation and the send lifecycle.

pub mod builder;
pub mod intent;
pub mod lifecycle;
pub mod msg;
pub mod service;

pub use builder::{BuildOutput, BuiltTransaction, SwapPlan, TransactionBuilder};
pub use intent::TransactionIntent;
pub use lifecycle::{LifecycleSnapshot, TransactionLifecycleStore};
pub use msg::{ChainMsg, EvmCall};
pub use service::{
    PreparedTransaction, PrivateKey, SendHooks, SignOptions, Signer, TransactionService, TxResult,
};
