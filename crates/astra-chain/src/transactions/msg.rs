//! Chain messages and EVM calls.
//!
//! A [`ChainMsg`] is one Cosmos SDK message with two wire encodings: amino JSON
//! (`{type, value}`, used for legacy signing) and the proto-JSON "direct" form
//! (`{"@type": ...}`). EVM intents are ABI-encoded into an [`EvmCall`].

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use astra_core::{Balance, Coin};
use serde_json::{Value, json};

sol! {
    function approve(address spender, uint256 amount) external returns (bool);
    function swapExactTokensForTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] path,
        address to,
        uint256 deadline
    ) external returns (uint256[] amounts);
    function safeTransferFrom(address from, address to, uint256 tokenId) external;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainMsg {
    Send {
        from_address: String,
        to_address: String,
        amount: Vec<Coin>,
    },
    Delegate {
        delegator_address: String,
        validator_address: String,
        amount: Coin,
    },
    Undelegate {
        delegator_address: String,
        validator_address: String,
        amount: Coin,
    },
    BeginRedelegate {
        delegator_address: String,
        validator_src_address: String,
        validator_dst_address: String,
        amount: Coin,
    },
    WithdrawDelegatorReward {
        delegator_address: String,
        validator_address: String,
    },
}

fn coin_json(coin: &Coin) -> Value {
    json!({"denom": coin.denom, "amount": coin.amount.to_string()})
}

impl ChainMsg {
    /// Proto type URL.
    pub fn type_url(&self) -> &'static str {
        match self {
            ChainMsg::Send { .. } => "/cosmos.bank.v1beta1.MsgSend",
            ChainMsg::Delegate { .. } => "/cosmos.staking.v1beta1.MsgDelegate",
            ChainMsg::Undelegate { .. } => "/cosmos.staking.v1beta1.MsgUndelegate",
            ChainMsg::BeginRedelegate { .. } => "/cosmos.staking.v1beta1.MsgBeginRedelegate",
            ChainMsg::WithdrawDelegatorReward { .. } => {
                "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward"
            }
        }
    }

    /// Amino type name.
    pub fn amino_type(&self) -> &'static str {
        match self {
            ChainMsg::Send { .. } => "cosmos-sdk/MsgSend",
            ChainMsg::Delegate { .. } => "cosmos-sdk/MsgDelegate",
            ChainMsg::Undelegate { .. } => "cosmos-sdk/MsgUndelegate",
            ChainMsg::BeginRedelegate { .. } => "cosmos-sdk/MsgBeginRedelegate",
            ChainMsg::WithdrawDelegatorReward { .. } => "cosmos-sdk/MsgWithdrawDelegationReward",
        }
    }

    fn body(&self) -> Value {
        match self {
            ChainMsg::Send {
                from_address,
                to_address,
                amount,
            } => json!({
                "from_address": from_address,
                "to_address": to_address,
                "amount": amount.iter().map(coin_json).collect::<Vec<_>>(),
            }),
            ChainMsg::Delegate {
                delegator_address,
                validator_address,
                amount,
            }
            | ChainMsg::Undelegate {
                delegator_address,
                validator_address,
                amount,
            } => json!({
                "delegator_address": delegator_address,
                "validator_address": validator_address,
                "amount": coin_json(amount),
            }),
            ChainMsg::BeginRedelegate {
                delegator_address,
                validator_src_address,
                validator_dst_address,
                amount,
            } => json!({
                "delegator_address": delegator_address,
                "validator_src_address": validator_src_address,
                "validator_dst_address": validator_dst_address,
                "amount": coin_json(amount),
            }),
            ChainMsg::WithdrawDelegatorReward {
                delegator_address,
                validator_address,
            } => json!({
                "delegator_address": delegator_address,
                "validator_address": validator_address,
            }),
        }
    }

    /// Amino JSON: `{"type": ..., "value": {...}}`.
    pub fn to_amino(&self) -> Value {
        json!({"type": self.amino_type(), "value": self.body()})
    }

    /// Proto-JSON: the message fields plus `"@type"`.
    pub fn to_direct(&self) -> Value {
        let mut body = self.body();
        if let Value::Object(map) = &mut body {
            map.insert("@type".to_string(), Value::String(self.type_url().to_string()));
        }
        body
    }

    /// Amount of `denom` this message moves out of the sender's spendable balance.
    pub fn spend_of(&self, denom: &str) -> Balance {
        match self {
            ChainMsg::Send { amount, .. } => astra_core::total(
                amount
                    .iter()
                    .filter(|c| c.denom == denom)
                    .map(|c| c.amount),
            ),
            ChainMsg::Delegate { amount, .. } if amount.denom == denom => amount.amount,
            _ => 0,
        }
    }
}

/// An EVM transaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl EvmCall {
    /// ERC-20 `approve(spender, amount)` on `token`.
    pub fn approve(token: Address, spender: Address, amount: U256) -> Self {
        let data = approveCall { spender, amount }.abi_encode();
        Self {
            to: token,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    /// Router `swapExactTokensForTokens`.
    pub fn swap_exact_tokens_for_tokens(
        router: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    ) -> Self {
        let data = swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            to: recipient,
            deadline,
        }
        .abi_encode();
        Self {
            to: router,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    /// ERC-721 `safeTransferFrom(from, to, tokenId)`.
    pub fn safe_transfer_from(contract: Address, from: Address, to: Address, token_id: U256) -> Self {
        let data = safeTransferFromCall {
            from,
            to,
            tokenId: token_id,
        }
        .abi_encode();
        Self {
            to: contract,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    /// Four-byte function selector, if the call has data.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }
}
