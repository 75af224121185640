//! Error types for chain operations.

use astra_core::AmountError;
use thiserror::Error;

/// Message a wallet returns when the user declines to sign.
pub const USER_REJECTION_MESSAGE: &str = "Request rejected";

#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("{}", USER_REJECTION_MESSAGE)]
    UserRejected,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ChainError {
    /// Whether this error means the user declined to sign.
    ///
    /// Signers report rejection as free-form text, so the message is matched too.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            ChainError::UserRejected => true,
            ChainError::Signing(msg) | ChainError::Broadcast(msg) => {
                msg.contains(USER_REJECTION_MESSAGE)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ChainError::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None if e.is_decode() => ChainError::Decode(e.to_string()),
            None => ChainError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::Decode(e.to_string())
    }
}

/// Input problems detected synchronously from cached data, before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount is below the minimum of {minimum}")]
    BelowMinimum { minimum: String },

    #[error("Insufficient balance: available {available}")]
    InsufficientBalance { available: String },

    #[error("Insufficient balance to cover the fee of {fee}")]
    InsufficientFee { fee: String },

    #[error("Nothing to claim")]
    NothingToClaim,
}

impl From<AmountError> for ValidationError {
    fn from(e: AmountError) -> Self {
        ValidationError::InvalidAmount(e.to_string())
    }
}

/// Lifecycle store misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("A transaction is already pending")]
    Busy,

    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: astra_core::TxState,
        to: astra_core::TxState,
    },

    #[error("No transaction staged")]
    NothingStaged,

    #[error("A newer transaction was staged")]
    Superseded,
}
