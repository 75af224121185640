//! User intents: what the user asked for, before validation and building.

use astra_core::{Balance, IntentKind};

/// A transaction the user asked for. Amounts are decimal strings in display
/// units, exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionIntent {
    Send {
        to: String,
        amount: String,
        memo: String,
    },
    Delegate {
        validator: String,
        amount: String,
    },
    Undelegate {
        validator: String,
        amount: String,
    },
    Redelegate {
        src_validator: String,
        dst_validator: String,
        amount: String,
    },
    /// Claim every reward above `dust` (minimal units); `None` uses the default threshold.
    WithdrawRewards { dust: Option<Balance> },
    Swap {
        router: String,
        /// Token addresses, input first.
        path: Vec<String>,
        amount_in: String,
        amount_out_min: String,
        /// Decimals of the input and output tokens.
        decimals_in: u8,
        decimals_out: u8,
        /// Unix timestamp after which the router rejects the swap.
        deadline: u64,
    },
    TransferNft {
        contract: String,
        to: String,
        token_id: String,
    },
}

impl TransactionIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            TransactionIntent::Send { .. } => IntentKind::Send,
            TransactionIntent::Delegate { .. } => IntentKind::Delegate,
            TransactionIntent::Undelegate { .. } => IntentKind::Undelegate,
            TransactionIntent::Redelegate { .. } => IntentKind::Redelegate,
            TransactionIntent::WithdrawRewards { .. } => IntentKind::WithdrawRewards,
            TransactionIntent::Swap { .. } => IntentKind::Swap,
            TransactionIntent::TransferNft { .. } => IntentKind::TransferNft,
        }
    }
}
