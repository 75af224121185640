//! Astra wallet CLI - inspect staking positions, history and fee estimates.

use astra_chain::queries::history::MessageView;
use astra_chain::{
    ChainQueries, ChainRegistry, GasEstimator, QueryCache, RestClient, StakingStore,
    TransactionBuilder, TransactionIntent,
};
use astra_core::config::{load_config, save_config};
use astra_core::{AppConfig, format_units, parse_units};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Astra wallet - terminal interface to the Astra chain.
#[derive(Parser, Debug)]
#[command(name = "astra")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chain id to connect to (defaults to the configured chain)
    #[arg(short, long)]
    chain: Option<String>,

    /// Custom REST (LCD) endpoint URL
    #[arg(long = "rest-url")]
    rest_url: Option<String>,

    /// Custom transaction indexer URL
    #[arg(long = "indexer-url")]
    indexer_url: Option<String>,

    /// Account address (defaults to the last used address)
    #[arg(short, long, global = true)]
    address: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the known chains.
    Chains,
    /// Show balances, stake, rewards and validator APRs.
    Staking {
        /// Number of validators to list
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Show transaction history.
    History {
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
        /// Records per page
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Validate a transaction and show its default fee.
    Estimate {
        #[command(subcommand)]
        intent: EstimateIntent,
    },
}

#[derive(Subcommand, Debug)]
enum EstimateIntent {
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        memo: String,
    },
    Delegate {
        #[arg(long)]
        validator: String,
        #[arg(long)]
        amount: String,
    },
    Undelegate {
        #[arg(long)]
        validator: String,
        #[arg(long)]
        amount: String,
    },
    /// Claim all rewards above the configured dust threshold.
    Claim,
}

impl EstimateIntent {
    fn into_intent(self, dust: Option<u128>) -> TransactionIntent {
        match self {
            EstimateIntent::Send { to, amount, memo } => {
                TransactionIntent::Send { to, amount, memo }
            }
            EstimateIntent::Delegate { validator, amount } => {
                TransactionIntent::Delegate { validator, amount }
            }
            EstimateIntent::Undelegate { validator, amount } => {
                TransactionIntent::Undelegate { validator, amount }
            }
            EstimateIntent::Claim => TransactionIntent::WithdrawRewards { dust },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("astra_cli=info".parse()?)
        .add_directive("astra_chain=info".parse()?)
        .add_directive("astra_core=info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_config().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let chain_id = args.chain.clone().unwrap_or_else(|| config.chain_id.clone());
    let mut registry = ChainRegistry::default();
    if let Some(url) = args.rest_url.as_ref().or(config.endpoints.rest_url.as_ref()) {
        registry = registry.with_rest_url(&chain_id, url)?;
    }
    if let Some(url) = args
        .indexer_url
        .as_ref()
        .or(config.endpoints.indexer_url.as_ref())
    {
        registry = registry.with_indexer_url(&chain_id, url)?;
    }

    let command = match args.command {
        Command::Chains => {
            for id in registry.chain_ids() {
                let chain = registry.get(id)?;
                println!("{:<20} {:<16} {}", id, chain.chain_name, chain.rest_url);
            }
            return Ok(());
        }
        command => command,
    };

    let chain = registry.get(&chain_id)?.clone();
    let address = args
        .address
        .or_else(|| config.last_address.clone())
        .ok_or_else(|| eyre!("No address given and none saved; pass --address"))?;
    astra_chain::address::validate_bech32(&address, &chain.bech32_prefix)?;

    let cache = QueryCache::new(Arc::new(RestClient::new()?));
    let queries = ChainQueries::new(cache, chain);
    tracing::info!("Using {} for {}", queries.chain().chain_id, address);

    match command {
        Command::Chains => {}
        Command::Staking { top } => show_staking(&queries, &address, &config, top).await?,
        Command::History { pages, limit } => {
            show_history(&queries, &address, pages, limit).await?
        }
        Command::Estimate { intent } => {
            let decimals = queries.chain().stake_currency.coin_decimals;
            let dust = parse_units(&config.reward_dust, decimals).ok();
            let intent = intent.into_intent(dust);
            estimate(&queries, &address, intent, config.gas_multiplier).await?
        }
    }

    if config.last_address.as_deref() != Some(address.as_str()) || config.chain_id != chain_id {
        config.last_address = Some(address);
        config.chain_id = chain_id;
        if let Err(e) = save_config(&config) {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    Ok(())
}

async fn show_staking(
    queries: &ChainQueries,
    address: &str,
    config: &AppConfig,
    top: usize,
) -> Result<()> {
    let store = StakingStore::new(queries, address);
    store.refresh().await?;
    store.validators.wait_fresh_response().await?;
    store.pool.wait_fresh_response().await?;
    // Mint queries feed the APR; a missing endpoint only zeroes it.
    if let Err(e) = store.mint_params.wait_fresh_response().await {
        tracing::warn!("Mint params unavailable: {}", e);
    }
    if let Err(e) = store.block_provision.wait_fresh_response().await {
        tracing::warn!("Block provision unavailable: {}", e);
    }

    let summary = store.summary();
    println!("Available:  {}", summary.available);
    println!("Staked:     {}", summary.staked);
    println!("Rewards:    {}", summary.rewards);
    println!("Unbonding:  {}", summary.unbonding);
    if let Some(total) = summary.total() {
        println!("Total:      {}", total);
    }
    println!("Chain APR:  {:.2}%", summary.chain_apr * 100.0);

    let currency = store.stake_currency().clone();
    let dust = parse_units(&config.reward_dust, currency.coin_decimals)
        .unwrap_or_else(|_| store.default_reward_dust());
    let claimable = store.withdrawable_rewards(dust);
    if !claimable.is_empty() {
        println!();
        println!("Claimable rewards:");
        for reward in &claimable {
            println!("  {:<52} {}", reward.validator_address, reward.amount);
        }
    }

    println!();
    println!("{:<24} {:>8} {:>8}", "Validator", "APR", "Comm.");
    for v in store.display_validators().iter().take(top) {
        let marker = if store.is_staking_to(&v.operator_address) {
            "*"
        } else {
            ""
        };
        println!(
            "{:<24} {:>7.2}% {:>7.2}%  {}",
            v.display_name(),
            v.apr_percent(),
            v.commission * 100.0,
            marker
        );
    }
    Ok(())
}

async fn show_history(
    queries: &ChainQueries,
    address: &str,
    pages: u32,
    limit: u32,
) -> Result<()> {
    let history = queries.history(address, limit);
    history.refresh().await?;
    for _ in 1..pages {
        if !history.load_more().await? {
            break;
        }
    }

    let state = history.state();
    for record in &state.items {
        let status = if record.is_success() { "ok" } else { "failed" };
        println!(
            "{} {:>10} {:<6} {}",
            record.timestamp, record.height, status, record.hash
        );
        for view in record.message_views() {
            match view {
                MessageView::Decoded(msg) => println!("    {:?}", msg),
                MessageView::Raw(json) => println!("    {}", json.replace('\n', "\n    ")),
            }
        }
    }
    println!(
        "{} of {} records loaded",
        state.items.len(),
        state.total
    );
    Ok(())
}

async fn estimate(
    queries: &ChainQueries,
    address: &str,
    intent: TransactionIntent,
    multiplier: Option<f64>,
) -> Result<()> {
    // Validation reads cached balances, so load them first.
    queries.balances(address).wait_fresh_response().await?;
    queries.delegations(address).wait_fresh_response().await?;
    if matches!(intent, TransactionIntent::WithdrawRewards { .. }) {
        queries.rewards(address).wait_fresh_response().await?;
    }

    let builder = TransactionBuilder::new(queries.clone());
    let built = builder.build(address, &intent)?;

    let suggested = match queries.fee_market().wait_fresh_response().await {
        Ok(params) => params.suggested_gas_price(),
        Err(e) => {
            tracing::warn!("Fee market unavailable, using default gas price: {}", e);
            None
        }
    };
    let mut estimator = GasEstimator::new(queries.chain().fee_currency().clone());
    if let Some(multiplier) = multiplier {
        estimator = estimator.with_multiplier(multiplier);
    }
    let estimate = estimator.default_estimate(intent.kind(), built.tx.msg_count(), suggested);
    builder.check_fee_reserve(address, &built.tx, &estimate.fee_denom, estimate.fee_amount)?;

    let fee_currency = queries.chain().fee_currency();
    println!("Intent:     {}", intent.kind().label());
    println!("Messages:   {}", built.tx.msg_count());
    for reward in &built.rewards {
        println!("  claim {} from {}", reward.amount, reward.validator_address);
    }
    println!("Gas limit:  {}", estimate.gas_limit);
    println!("Gas price:  {} {}", estimate.gas_price, estimate.fee_denom);
    println!(
        "Fee:        {} {}",
        format_units(estimate.fee_amount, fee_currency.coin_decimals),
        fee_currency.coin_denom
    );
    Ok(())
}
