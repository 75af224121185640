//! Transaction history from the chain indexer.
//!
//! Records carry the decoded messages, the list of message type URLs and the
//! raw event `log`. Amounts that the messages do not state (e.g., how much a
//! swap paid out) are recovered from `coin_received` events in the log.

use super::{ApiCoin, ChainQueries, de_u64};
use crate::query::{Page, PagedList, QueryRequest, Record};
use astra_core::{Balance, Coin};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Indexer pagination block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerPagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_page: u32,
    #[serde(default)]
    pub total_record: u64,
    #[serde(default)]
    pub limit: u32,
}

/// One indexed transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub height: u64,
    #[serde(default)]
    pub timestamp: String,
    /// Result code; 0 means success.
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message_types: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Value>,
    /// JSON array of per-message events, as emitted by the node.
    #[serde(default, deserialize_with = "de_log")]
    pub log: String,
}

impl Record for TxRecord {
    fn record_id(&self) -> String {
        self.hash.clone()
    }
}

/// A message as the history view shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageView {
    Decoded(DecodedMessage),
    /// Pretty-printed JSON for messages that could not be decoded.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "@type")]
pub enum DecodedMessage {
    #[serde(rename = "/cosmos.bank.v1beta1.MsgSend")]
    Send {
        from_address: String,
        to_address: String,
        amount: Vec<ApiCoin>,
    },
    #[serde(rename = "/cosmos.staking.v1beta1.MsgDelegate")]
    Delegate {
        delegator_address: String,
        validator_address: String,
        amount: ApiCoin,
    },
    #[serde(rename = "/cosmos.staking.v1beta1.MsgUndelegate")]
    Undelegate {
        delegator_address: String,
        validator_address: String,
        amount: ApiCoin,
    },
    #[serde(rename = "/cosmos.staking.v1beta1.MsgBeginRedelegate")]
    BeginRedelegate {
        delegator_address: String,
        validator_src_address: String,
        validator_dst_address: String,
        amount: ApiCoin,
    },
    #[serde(rename = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward")]
    WithdrawDelegatorReward {
        delegator_address: String,
        validator_address: String,
    },
    #[serde(rename = "/ethermint.evm.v1.MsgEthereumTx")]
    EthereumTx {
        #[serde(default)]
        hash: String,
    },
}

/// An event attribute from the tx log.
#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MessageLog {
    #[serde(default)]
    events: Vec<TxEvent>,
}

impl TxRecord {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Whether any message in the transaction has the given type URL suffix (e.g., "MsgSend").
    pub fn has_message_type(&self, suffix: &str) -> bool {
        self.message_types.iter().any(|t| t.ends_with(suffix))
    }

    /// Decode every message, falling back to a raw JSON dump per message.
    pub fn message_views(&self) -> Vec<MessageView> {
        self.messages.iter().map(decode_message).collect()
    }

    /// Events from the log. An unparseable log yields no events.
    pub fn events(&self) -> Vec<TxEvent> {
        if self.log.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<MessageLog>>(&self.log) {
            Ok(logs) => logs.into_iter().flat_map(|l| l.events).collect(),
            Err(e) => {
                tracing::debug!("Unparseable log for tx {}: {}", self.hash, e);
                Vec::new()
            }
        }
    }

    /// Every coin credited to `address` according to `coin_received` events.
    pub fn received_by(&self, address: &str) -> Vec<Coin> {
        self.events()
            .iter()
            .filter(|e| e.kind == "coin_received")
            .filter(|e| e.attribute("receiver") == Some(address))
            .filter_map(|e| e.attribute("amount"))
            .flat_map(parse_coins)
            .collect()
    }

    /// Output of a swap: the last coin credited to `address`.
    pub fn swap_output(&self, address: &str) -> Option<Coin> {
        self.received_by(address).pop()
    }
}

/// Decode one message, or dump it as pretty JSON if its shape is unknown.
pub fn decode_message(message: &Value) -> MessageView {
    match DecodedMessage::deserialize(message) {
        Ok(decoded) => MessageView::Decoded(decoded),
        Err(_) => MessageView::Raw(
            serde_json::to_string_pretty(message).unwrap_or_else(|_| message.to_string()),
        ),
    }
}

/// Parse a comma-separated coin list such as `"1000aastra,5ibc/ABC"`.
///
/// Malformed entries are skipped.
pub fn parse_coins(value: &str) -> Vec<Coin> {
    value
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            let split = part.find(|c: char| !c.is_ascii_digit())?;
            let (amount, denom) = part.split_at(split);
            let amount: Balance = amount.parse().ok()?;
            (!denom.is_empty()).then(|| Coin::new(denom, amount))
        })
        .collect()
}

/// The log is usually a JSON string, but some indexers inline the array.
fn de_log<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// One page of indexer history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub data: Vec<TxRecord>,
    #[serde(default)]
    pub pagination: IndexerPagination,
}

impl Page for HistoryPage {
    type Item = TxRecord;

    fn items(&self) -> &[TxRecord] {
        &self.data
    }

    fn total(&self) -> u64 {
        self.pagination.total_record
    }
}

impl ChainQueries {
    /// Paginated transaction history for a bech32 or hex address.
    pub fn history(&self, address: &str, limit: u32) -> PagedList<HistoryPage> {
        let base = QueryRequest::new(&self.chain().indexer_url, "/api/v1/txs")
            .param("address", address)
            .require("address");
        PagedList::new(self.cache().clone(), base, limit)
    }
}
