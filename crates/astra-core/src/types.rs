//! Core domain types shared by the cache, the transaction pipeline and front ends.

use serde::{Deserialize, Serialize};

use crate::amount::format_units;

/// Integer amount in a currency's minimal denomination.
pub type Balance = u128;

/// Currency metadata as published by the chain registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// Display denom (e.g., "ASA").
    pub coin_denom: String,
    /// On-chain denom (e.g., "aastra").
    pub coin_minimal_denom: String,
    /// Number of decimals between the display and minimal denoms.
    pub coin_decimals: u8,
}

impl Currency {
    pub fn new(coin_denom: &str, coin_minimal_denom: &str, coin_decimals: u8) -> Self {
        Self {
            coin_denom: coin_denom.to_string(),
            coin_minimal_denom: coin_minimal_denom.to_string(),
            coin_decimals,
        }
    }

    /// Wrap a minimal-denom amount of this currency.
    pub fn amount(&self, amount: Balance) -> CoinAmount {
        CoinAmount {
            currency: self.clone(),
            amount,
        }
    }

    pub fn zero(&self) -> CoinAmount {
        self.amount(0)
    }
}

/// A raw on-chain coin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Balance,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Balance) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

/// A coin paired with its currency metadata so it can be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinAmount {
    pub currency: Currency,
    pub amount: Balance,
}

impl CoinAmount {
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Add another amount of the same currency.
    ///
    /// Returns `None` if the currencies differ or the sum overflows.
    pub fn checked_add(&self, other: &CoinAmount) -> Option<CoinAmount> {
        if self.currency.coin_minimal_denom != other.currency.coin_minimal_denom {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| self.currency.amount(amount))
    }

    pub fn to_coin(&self) -> Coin {
        Coin::new(self.currency.coin_minimal_denom.clone(), self.amount)
    }

    /// Decimal string in display units without trailing zeros (e.g., "12.5").
    pub fn to_dec_string(&self) -> String {
        format_units(self.amount, self.currency.coin_decimals)
    }
}

impl std::fmt::Display for CoinAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_dec_string(), self.currency.coin_denom)
    }
}

/// Kind of transaction a user can initiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Send,
    Delegate,
    Undelegate,
    Redelegate,
    WithdrawRewards,
    Swap,
    TransferNft,
}

impl IntentKind {
    /// Get display label for the transaction type.
    pub fn label(&self) -> &'static str {
        match self {
            IntentKind::Send => "Send",
            IntentKind::Delegate => "Delegate",
            IntentKind::Undelegate => "Undelegate",
            IntentKind::Redelegate => "Redelegate",
            IntentKind::WithdrawRewards => "Claim Rewards",
            IntentKind::Swap => "Swap",
            IntentKind::TransferNft => "Transfer NFT",
        }
    }

    /// Whether the intent is executed as an EVM call rather than Cosmos messages.
    pub fn is_evm(&self) -> bool {
        matches!(self, IntentKind::Swap | IntentKind::TransferNft)
    }
}

/// Lifecycle state of the single in-flight transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxState {
    #[default]
    None,
    Pending,
    Success,
    Failure,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Success | TxState::Failure)
    }

    /// A new intent may be staged only when nothing is in flight.
    pub fn accepts_new_intent(&self) -> bool {
        !matches!(self, TxState::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxState::None => "Idle",
            TxState::Pending => "Pending",
            TxState::Success => "Success",
            TxState::Failure => "Failed",
        }
    }
}
