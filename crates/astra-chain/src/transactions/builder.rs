//! Intent validation and message construction.
//!
//! Everything here runs against cached data only. A missing cache entry is
//! treated as a zero balance, so nothing is built from data that was never
//! loaded.

use crate::address::{bech32_to_evm, parse_evm_address, validate_bech32};
use crate::error::ValidationError;
use crate::queries::ChainQueries;
use crate::queries::staking_store::{PendingReward, default_reward_dust, pending_rewards};
use crate::registry::ChainInfo;
use crate::transactions::intent::TransactionIntent;
use crate::transactions::msg::{ChainMsg, EvmCall};
use alloy_primitives::{Address, U256};
use astra_core::{Balance, Coin, CoinAmount, format_units, parse_units};

/// Smallest stake amount accepted, in display units.
pub const DEFAULT_MIN_STAKE_DISPLAY: &str = "0.000001";

/// Built transaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltTransaction {
    Cosmos { msgs: Vec<ChainMsg>, memo: String },
    Evm(EvmCall),
}

impl BuiltTransaction {
    pub fn msg_count(&self) -> usize {
        match self {
            BuiltTransaction::Cosmos { msgs, .. } => msgs.len(),
            BuiltTransaction::Evm(_) => 1,
        }
    }

    /// Native amount leaving the sender, excluding the fee.
    pub fn spend_of(&self, denom: &str) -> Balance {
        match self {
            BuiltTransaction::Cosmos { msgs, .. } => {
                astra_core::total(msgs.iter().map(|m| m.spend_of(denom)))
            }
            BuiltTransaction::Evm(call) => call.value.try_into().unwrap_or(Balance::MAX),
        }
    }
}

/// Swap details the send pipeline needs beyond the call itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub token_in: Address,
    pub router: Address,
    pub amount_in: U256,
}

/// Result of building one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub tx: BuiltTransaction,
    /// Rewards claimed, largest first (withdraw intents only).
    pub rewards: Vec<PendingReward>,
    pub swap: Option<SwapPlan>,
}

impl BuildOutput {
    fn plain(tx: BuiltTransaction) -> Self {
        Self {
            tx,
            rewards: Vec::new(),
            swap: None,
        }
    }
}

pub struct TransactionBuilder {
    queries: ChainQueries,
    min_stake: Balance,
}

impl TransactionBuilder {
    pub fn new(queries: ChainQueries) -> Self {
        let decimals = queries.chain().stake_currency.coin_decimals;
        let min_stake = parse_units(DEFAULT_MIN_STAKE_DISPLAY, decimals)
            .unwrap_or(1)
            .max(1);
        Self { queries, min_stake }
    }

    pub fn with_min_stake(mut self, min_stake: Balance) -> Self {
        self.min_stake = min_stake.max(1);
        self
    }

    pub fn chain(&self) -> &ChainInfo {
        self.queries.chain()
    }

    fn stake_denom(&self) -> &str {
        &self.chain().stake_currency.coin_minimal_denom
    }

    fn stake_amount(&self, amount: Balance) -> CoinAmount {
        self.chain().stake_currency.amount(amount)
    }

    /// Cached spendable balance of `denom`; zero when not loaded.
    pub fn spendable(&self, sender: &str, denom: &str) -> Balance {
        self.queries
            .balances(sender)
            .data()
            .map(|b| b.amount_of(denom))
            .unwrap_or(0)
    }

    fn delegated_to(&self, sender: &str, validator: &str) -> Balance {
        self.queries
            .delegations(sender)
            .data()
            .map(|d| d.amount_to(validator))
            .unwrap_or(0)
    }

    /// Parse a positive stake-currency amount.
    fn parse_stake(&self, amount: &str) -> Result<Balance, ValidationError> {
        let decimals = self.chain().stake_currency.coin_decimals;
        let units = parse_units(amount, decimals)?;
        if units == 0 {
            return Err(ValidationError::InvalidAmount(amount.to_string()));
        }
        Ok(units)
    }

    fn check_min_stake(&self, units: Balance) -> Result<(), ValidationError> {
        if units < self.min_stake {
            return Err(ValidationError::BelowMinimum {
                minimum: self.stake_amount(self.min_stake).to_string(),
            });
        }
        Ok(())
    }

    fn check_available(&self, units: Balance, available: Balance) -> Result<(), ValidationError> {
        if units > available {
            return Err(ValidationError::InsufficientBalance {
                available: self.stake_amount(available).to_string(),
            });
        }
        Ok(())
    }

    fn validator(&self, address: &str) -> Result<(), ValidationError> {
        validate_bech32(address, &self.chain().validator_prefix())
    }

    /// Validate an intent against cached data and build its transaction.
    pub fn build(
        &self,
        sender: &str,
        intent: &TransactionIntent,
    ) -> Result<BuildOutput, ValidationError> {
        let prefix = &self.chain().bech32_prefix;
        validate_bech32(sender, prefix)?;
        let denom = self.stake_denom().to_string();

        let output = match intent {
            TransactionIntent::Send { to, amount, memo } => {
                validate_bech32(to, prefix)?;
                let units = self.parse_stake(amount)?;
                self.check_available(units, self.spendable(sender, &denom))?;
                BuildOutput::plain(BuiltTransaction::Cosmos {
                    msgs: vec![ChainMsg::Send {
                        from_address: sender.to_string(),
                        to_address: to.clone(),
                        amount: vec![Coin::new(denom, units)],
                    }],
                    memo: memo.clone(),
                })
            }
            TransactionIntent::Delegate { validator, amount } => {
                self.validator(validator)?;
                let units = self.parse_stake(amount)?;
                self.check_min_stake(units)?;
                self.check_available(units, self.spendable(sender, &denom))?;
                BuildOutput::plain(BuiltTransaction::Cosmos {
                    msgs: vec![ChainMsg::Delegate {
                        delegator_address: sender.to_string(),
                        validator_address: validator.clone(),
                        amount: Coin::new(denom, units),
                    }],
                    memo: String::new(),
                })
            }
            TransactionIntent::Undelegate { validator, amount } => {
                self.validator(validator)?;
                let units = self.parse_stake(amount)?;
                self.check_min_stake(units)?;
                self.check_available(units, self.delegated_to(sender, validator))?;
                BuildOutput::plain(BuiltTransaction::Cosmos {
                    msgs: vec![ChainMsg::Undelegate {
                        delegator_address: sender.to_string(),
                        validator_address: validator.clone(),
                        amount: Coin::new(denom, units),
                    }],
                    memo: String::new(),
                })
            }
            TransactionIntent::Redelegate {
                src_validator,
                dst_validator,
                amount,
            } => {
                self.validator(src_validator)?;
                self.validator(dst_validator)?;
                if src_validator == dst_validator {
                    return Err(ValidationError::InvalidAddress(dst_validator.clone()));
                }
                let units = self.parse_stake(amount)?;
                self.check_min_stake(units)?;
                self.check_available(units, self.delegated_to(sender, src_validator))?;
                BuildOutput::plain(BuiltTransaction::Cosmos {
                    msgs: vec![ChainMsg::BeginRedelegate {
                        delegator_address: sender.to_string(),
                        validator_src_address: src_validator.clone(),
                        validator_dst_address: dst_validator.clone(),
                        amount: Coin::new(denom, units),
                    }],
                    memo: String::new(),
                })
            }
            TransactionIntent::WithdrawRewards { dust } => {
                let rewards = self.withdrawable_rewards(sender, *dust);
                if rewards.is_empty() {
                    return Err(ValidationError::NothingToClaim);
                }
                let msgs = rewards
                    .iter()
                    .map(|r| ChainMsg::WithdrawDelegatorReward {
                        delegator_address: sender.to_string(),
                        validator_address: r.validator_address.clone(),
                    })
                    .collect();
                BuildOutput {
                    tx: BuiltTransaction::Cosmos {
                        msgs,
                        memo: String::new(),
                    },
                    rewards,
                    swap: None,
                }
            }
            TransactionIntent::Swap {
                router,
                path,
                amount_in,
                amount_out_min,
                decimals_in,
                decimals_out,
                deadline,
            } => self.build_swap(
                sender,
                router,
                path,
                amount_in,
                amount_out_min,
                (*decimals_in, *decimals_out),
                *deadline,
            )?,
            TransactionIntent::TransferNft {
                contract,
                to,
                token_id,
            } => {
                let from = bech32_to_evm(sender, prefix)?;
                let contract = parse_evm_address(contract)?;
                let to = self.evm_recipient(to)?;
                let token_id = U256::from_str_radix(token_id.trim(), 10)
                    .map_err(|_| ValidationError::InvalidAmount(token_id.clone()))?;
                BuildOutput::plain(BuiltTransaction::Evm(EvmCall::safe_transfer_from(
                    contract, from, to, token_id,
                )))
            }
        };

        tracing::debug!(
            "Built {} with {} message(s)",
            intent.kind().label(),
            output.tx.msg_count()
        );
        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_swap(
        &self,
        sender: &str,
        router: &str,
        path: &[String],
        amount_in: &str,
        amount_out_min: &str,
        (decimals_in, decimals_out): (u8, u8),
        deadline: u64,
    ) -> Result<BuildOutput, ValidationError> {
        let recipient = bech32_to_evm(sender, &self.chain().bech32_prefix)?;
        let router = parse_evm_address(router)?;
        if path.len() < 2 {
            return Err(ValidationError::InvalidAddress(path.join(",")));
        }
        let path: Vec<Address> = path
            .iter()
            .map(|p| parse_evm_address(p))
            .collect::<Result<_, _>>()?;

        let units_in = parse_units(amount_in, decimals_in)?;
        if units_in == 0 {
            return Err(ValidationError::InvalidAmount(amount_in.to_string()));
        }
        let units_out_min = parse_units(amount_out_min, decimals_out)?;

        // Only checked when the token list is cached.
        let hex_sender = format!("{:#x}", recipient);
        if let Some(tokens) = self.queries.tokens(&hex_sender).data()
            && let Some(token) = tokens
                .data
                .iter()
                .find(|t| parse_evm_address(&t.contract_address).ok() == Some(path[0]))
            && units_in > token.balance
        {
            return Err(ValidationError::InsufficientBalance {
                available: token.currency().amount(token.balance).to_string(),
            });
        }

        let amount_in = U256::from(units_in);
        let call = EvmCall::swap_exact_tokens_for_tokens(
            router,
            amount_in,
            U256::from(units_out_min),
            path.clone(),
            recipient,
            U256::from(deadline),
        );
        Ok(BuildOutput {
            tx: BuiltTransaction::Evm(call),
            rewards: Vec::new(),
            swap: Some(SwapPlan {
                token_in: path[0],
                router,
                amount_in,
            }),
        })
    }

    /// Accept an EVM recipient in either hex or bech32 form.
    fn evm_recipient(&self, to: &str) -> Result<Address, ValidationError> {
        let prefix = &self.chain().bech32_prefix;
        if to.starts_with(prefix.as_str()) {
            bech32_to_evm(to, prefix)
        } else {
            parse_evm_address(to)
        }
    }

    /// Rewards strictly above the dust threshold, largest first.
    pub fn withdrawable_rewards(&self, sender: &str, dust: Option<Balance>) -> Vec<PendingReward> {
        let currency = &self.chain().stake_currency;
        let dust = dust.unwrap_or_else(|| default_reward_dust(currency));
        self.queries
            .rewards(sender)
            .data()
            .map(|r| pending_rewards(&r, currency, dust))
            .unwrap_or_default()
    }

    /// Check that the fee still fits next to what the transaction spends.
    pub fn check_fee_reserve(
        &self,
        sender: &str,
        tx: &BuiltTransaction,
        fee_denom: &str,
        fee_amount: Balance,
    ) -> Result<(), ValidationError> {
        let available = self.spendable(sender, fee_denom);
        let needed = tx.spend_of(fee_denom).saturating_add(fee_amount);
        if needed > available {
            let decimals = self
                .chain()
                .find_currency(fee_denom)
                .map(|c| c.coin_decimals)
                .unwrap_or(0);
            return Err(ValidationError::InsufficientFee {
                fee: format!("{} {}", format_units(fee_amount, decimals), fee_denom),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::encode_bech32;
    use crate::query::QueryCache;
    use crate::registry::ChainRegistry;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    const ASA: Balance = 1_000_000_000_000_000_000;

    fn addr(byte: u8) -> String {
        encode_bech32("astra", &[byte; 20]).unwrap()
    }

    fn valoper(byte: u8) -> String {
        encode_bech32("astravaloper", &[byte; 20]).unwrap()
    }

    fn setup() -> (Arc<MockTransport>, TransactionBuilder, ChainQueries) {
        let transport = Arc::new(MockTransport::new());
        let chain = ChainRegistry::default().get("astra_11110-1").unwrap().clone();
        let queries = ChainQueries::new(QueryCache::new(transport.clone()), chain);
        (transport, TransactionBuilder::new(queries.clone()), queries)
    }

    async fn load_balance(transport: &MockTransport, queries: &ChainQueries, sender: &str, amount: Balance) {
        let query = queries.balances(sender);
        transport.respond(
            &query.request().url(),
            json!({"balances": [{"denom": "aastra", "amount": amount.to_string()}]}),
        );
        query.wait_fresh_response().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_truncates_and_builds() {
        let (transport, builder, queries) = setup();
        let sender = addr(1);
        load_balance(&transport, &queries, &sender, 20 * ASA).await;

        let intent = TransactionIntent::Send {
            to: addr(2),
            amount: "12.5".into(),
            memo: "hi".into(),
        };
        let out = builder.build(&sender, &intent).unwrap();
        match &out.tx {
            BuiltTransaction::Cosmos { msgs, memo } => {
                assert_eq!(memo, "hi");
                assert_eq!(msgs[0].spend_of("aastra"), 12_500_000_000_000_000_000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (transport, builder, queries) = setup();
        let sender = addr(1);
        load_balance(&transport, &queries, &sender, ASA).await;

        let send = |to: String, amount: &str| TransactionIntent::Send {
            to,
            amount: amount.into(),
            memo: String::new(),
        };
        assert!(matches!(
            builder.build(&sender, &send("cosmos1xyz".into(), "1")),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert!(matches!(
            builder.build(&sender, &send(addr(2), "abc")),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            builder.build(&sender, &send(addr(2), "0")),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            builder.build(&sender, &send(addr(2), "2")),
            Err(ValidationError::InsufficientBalance { .. })
        ));

        let tiny = TransactionIntent::Delegate {
            validator: valoper(3),
            amount: "0.000000000000000001".into(),
        };
        assert!(matches!(
            builder.build(&sender, &tiny),
            Err(ValidationError::BelowMinimum { .. })
        ));

        // A validator address in the account prefix is rejected.
        let wrong_prefix = TransactionIntent::Delegate {
            validator: addr(3),
            amount: "0.5".into(),
        };
        assert!(matches!(
            builder.build(&sender, &wrong_prefix),
            Err(ValidationError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_uncached_balance_is_zero() {
        let (_transport, builder, _queries) = setup();
        let intent = TransactionIntent::Delegate {
            validator: valoper(3),
            amount: "1".into(),
        };
        assert!(matches!(
            builder.build(&addr(1), &intent),
            Err(ValidationError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_fee_reserve() {
        let (transport, builder, queries) = setup();
        let sender = addr(1);
        load_balance(&transport, &queries, &sender, ASA).await;
        let intent = TransactionIntent::Delegate {
            validator: valoper(3),
            amount: "1".into(),
        };
        let out = builder.build(&sender, &intent).unwrap();
        assert!(builder.check_fee_reserve(&sender, &out.tx, "aastra", 0).is_ok());
        assert!(matches!(
            builder.check_fee_reserve(&sender, &out.tx, "aastra", 1),
            Err(ValidationError::InsufficientFee { .. })
        ));
    }

    #[tokio::test]
    async fn test_undelegate_limited_by_delegation() {
        let (transport, builder, queries) = setup();
        let sender = addr(1);
        let query = queries.delegations(&sender);
        transport.respond(
            &query.request().url(),
            json!({"delegations": [{"validator": valoper(3), "amount": ASA.to_string()}]}),
        );
        query.wait_fresh_response().await.unwrap();

        let ok = TransactionIntent::Undelegate {
            validator: valoper(3),
            amount: "1".into(),
        };
        assert!(builder.build(&sender, &ok).is_ok());

        let too_much = TransactionIntent::Redelegate {
            src_validator: valoper(3),
            dst_validator: valoper(4),
            amount: "1.5".into(),
        };
        assert!(matches!(
            builder.build(&sender, &too_much),
            Err(ValidationError::InsufficientBalance { .. })
        ));

        let same = TransactionIntent::Redelegate {
            src_validator: valoper(3),
            dst_validator: valoper(3),
            amount: "0.5".into(),
        };
        assert!(matches!(
            builder.build(&sender, &same),
            Err(ValidationError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_withdraw_aggregates_rewards() {
        let (transport, builder, queries) = setup();
        let sender = addr(1);
        let query = queries.rewards(&sender);
        let reward = |v: String, amount: Balance| {
            json!({"validator_address": v, "reward": [{"denom": "aastra", "amount": format!("{}.0", amount)}]})
        };
        transport.respond(
            &query.request().url(),
            json!({"rewards": [
                reward(valoper(1), ASA / 5),
                reward(valoper(2), ASA / 200),
                reward(valoper(3), 13 * ASA / 10)
            ]}),
        );
        query.wait_fresh_response().await.unwrap();

        let out = builder
            .build(&sender, &TransactionIntent::WithdrawRewards { dust: None })
            .unwrap();
        assert_eq!(out.tx.msg_count(), 2);
        let amounts: Vec<String> = out.rewards.iter().map(|r| r.amount.to_dec_string()).collect();
        assert_eq!(amounts, vec!["1.3", "0.2"]);
        match &out.tx {
            BuiltTransaction::Cosmos { msgs, .. } => assert!(matches!(
                &msgs[0],
                ChainMsg::WithdrawDelegatorReward { validator_address, .. } if *validator_address == valoper(3)
            )),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            builder.build(&sender, &TransactionIntent::WithdrawRewards { dust: Some(2 * ASA) }),
            Err(ValidationError::NothingToClaim)
        );
    }

    #[tokio::test]
    async fn test_nft_transfer_accepts_bech32_recipient() {
        let (_transport, builder, _queries) = setup();
        let intent = TransactionIntent::TransferNft {
            contract: format!("{:#x}", Address::repeat_byte(0xcc)),
            to: addr(2),
            token_id: "42".into(),
        };
        let out = builder.build(&addr(1), &intent).unwrap();
        match out.tx {
            BuiltTransaction::Evm(call) => {
                assert_eq!(call.to, Address::repeat_byte(0xcc));
                assert_eq!(call.selector(), Some([0x42, 0x84, 0x2e, 0x0e]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_swap_plan() {
        let (_transport, builder, _queries) = setup();
        let token_in = Address::repeat_byte(0x0a);
        let intent = TransactionIntent::Swap {
            router: format!("{:#x}", Address::repeat_byte(0x0f)),
            path: vec![
                format!("{:#x}", token_in),
                format!("{:#x}", Address::repeat_byte(0x0b)),
            ],
            amount_in: "1.5".into(),
            amount_out_min: "0".into(),
            decimals_in: 6,
            decimals_out: 18,
            deadline: 1_900_000_000,
        };
        let out = builder.build(&addr(1), &intent).unwrap();
        let plan = out.swap.unwrap();
        assert_eq!(plan.token_in, token_in);
        assert_eq!(plan.amount_in, U256::from(1_500_000u64));
    }
}
