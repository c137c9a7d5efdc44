//! stakeview: command-line client for the token staking contract.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use stakeview_chain::{
    EventReader, NodeSigner, RpcChainReader, RpcChainWriter, RpcClient, RpcEventSource, TxReceipt,
};
use stakeview_coordinator::{StakingCoordinator, StakingEvent};
use stakeview_types::{Address, SystemClock, TransactionEvent};
use stakeview_utils::{init_logging, LogFormat};
use stakeview_views::filter_by_user;

use crate::config::ClientConfig;

type Coordinator = StakingCoordinator<RpcChainReader, RpcChainWriter<NodeSigner>, RpcEventSource>;

#[derive(Parser)]
#[command(name = "stakeview", about = "Staking dashboard and actions for an ERC-20 staking contract")]
struct Cli {
    /// JSON-RPC endpoint of the chain node.
    #[arg(long, env = "STAKEVIEW_RPC_URL")]
    rpc_url: Option<String>,

    /// Expected chain id.
    #[arg(long, env = "STAKEVIEW_CHAIN_ID")]
    chain_id: Option<u64>,

    #[arg(long, env = "STAKEVIEW_STAKING_CONTRACT")]
    staking_contract: Option<Address>,

    #[arg(long, env = "STAKEVIEW_TOKEN_CONTRACT")]
    token_contract: Option<Address>,

    /// First block searched for history events.
    #[arg(long, env = "STAKEVIEW_DEPLOYMENT_BLOCK")]
    deployment_block: Option<u64>,

    /// Largest block span per log query.
    #[arg(long, env = "STAKEVIEW_MAX_BLOCK_RANGE")]
    max_block_range: Option<u64>,

    /// Account the node signs for. Without one, only reads are possible.
    #[arg(long, env = "STAKEVIEW_ACCOUNT")]
    account: Option<Address>,

    #[arg(long, env = "STAKEVIEW_PROJECT_ID")]
    project_id: Option<String>,

    /// Block explorer base URL used for transaction links.
    #[arg(long, env = "STAKEVIEW_EXPLORER_URL")]
    explorer_url: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "STAKEVIEW_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "STAKEVIEW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "STAKEVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Show balances, contract parameters and the current position.
    Status,
    /// Allow the staking contract to spend AMOUNT tokens.
    Approve { amount: String },
    /// Stake AMOUNT tokens. Requires a sufficient allowance.
    Stake { amount: String },
    /// Withdraw AMOUNT, or the whole stake when omitted.
    Withdraw { amount: Option<String> },
    /// Withdraw everything before the lock ends, paying the penalty.
    EmergencyWithdraw,
    /// Claim pending rewards.
    Claim,
    /// List recent staking events, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Only events of the configured account.
        #[arg(long)]
        mine: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// File config (or defaults) with flags and env vars layered on top.
    fn resolve_config(&self) -> anyhow::Result<ClientConfig> {
        let base = match &self.config {
            Some(path) => ClientConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        Ok(ClientConfig {
            rpc_url: self.rpc_url.clone().unwrap_or(base.rpc_url),
            chain_id: self.chain_id.unwrap_or(base.chain_id),
            staking_contract: self.staking_contract.unwrap_or(base.staking_contract),
            token_contract: self.token_contract.unwrap_or(base.token_contract),
            deployment_block: self.deployment_block.unwrap_or(base.deployment_block),
            max_block_range: self.max_block_range.or(base.max_block_range),
            account: self.account.or(base.account),
            project_id: self.project_id.clone().or(base.project_id),
            explorer_url: self.explorer_url.clone().unwrap_or(base.explorer_url),
            log_format: self.log_format.unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            ..base
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level).context("initialising logging")?;

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if !config.contracts_configured() {
        tracing::warn!("staking or token contract address not configured");
    }
    if let Some(project_id) = &config.project_id {
        tracing::info!(project_id = %project_id, "application identifier");
    }

    let rpc = RpcClient::new(config.rpc_url.clone())?;
    check_chain_id(&rpc, config.chain_id).await;
    let coordinator = build_coordinator(rpc, &config);

    coordinator.subscribe(|event| match event {
        StakingEvent::PhaseChanged { action, phase } => {
            tracing::debug!(action = %action, phase = ?phase, "action phase");
        }
        StakingEvent::RefreshFailed { view, error } => {
            tracing::warn!(view = *view, error = %error, "view refresh failed");
        }
        _ => {}
    });

    coordinator.sync_account().await;

    let explorer = config.explorer_url.as_str();
    match cli.command {
        Command::Status => print_status(&coordinator).await,
        Command::Approve { amount } => {
            let receipt = coordinator.approve(&amount).await.context("approve failed")?;
            print_receipt(&format!("Approved {amount}"), &receipt, explorer);
        }
        Command::Stake { amount } => {
            let position = coordinator.stake(&amount).await.context("stake failed")?;
            println!("Staked {amount}. Position: {} ({:?})", position.amount, position.status);
        }
        Command::Withdraw { amount } => {
            let receipt = coordinator
                .withdraw(amount.as_deref())
                .await
                .context("withdraw failed")?;
            let what = match amount {
                Some(amount) => format!("Withdrew {amount}"),
                None => "Withdrew full stake".to_string(),
            };
            print_receipt(&what, &receipt, explorer);
        }
        Command::EmergencyWithdraw => {
            let receipt = coordinator
                .emergency_withdraw()
                .await
                .context("emergency withdraw failed")?;
            print_receipt("Emergency withdrawal complete", &receipt, explorer);
        }
        Command::Claim => {
            let claimed = coordinator.claim_rewards().await.context("claim failed")?;
            println!("Claimed {} in rewards", claimed.to_fixed(2));
        }
        Command::History { limit, mine } => {
            let outcome = coordinator.refresh_history().await;
            if let Some(err) = outcome.error() {
                return Err(anyhow::Error::new(err.clone()).context("loading history failed"));
            }
            let events = coordinator.history().value_or_default().await;
            let account = match (mine, coordinator.account()) {
                (true, Some(account)) => Some(account),
                (true, None) => anyhow::bail!("--mine requires --account"),
                (false, _) => None,
            };
            let shown: Vec<&TransactionEvent> = match &account {
                Some(account) => filter_by_user(&events, account).take(limit).collect(),
                None => events.iter().take(limit).collect(),
            };
            print_history(&shown, explorer);
        }
        Command::Config => {}
    }

    Ok(())
}

/// Warn when the node is on a different chain than configured.
async fn check_chain_id(rpc: &RpcClient, expected: u64) {
    match rpc.chain_id().await {
        Ok(actual) if actual != expected => {
            tracing::warn!(expected, actual, "node reports a different chain id than configured");
        }
        Ok(_) => tracing::debug!(chain_id = expected, "chain id verified"),
        Err(e) => tracing::warn!(error = %e, "could not query chain id"),
    }
}

fn build_coordinator(rpc: RpcClient, config: &ClientConfig) -> Coordinator {
    let reader = RpcChainReader::new(rpc.clone(), config.staking_contract, config.token_contract);
    let session = config.account.map(|account| NodeSigner::new(rpc.clone(), account));
    let writer = RpcChainWriter::new(
        rpc.clone(),
        session,
        config.staking_contract,
        config.token_contract,
    )
    .with_polling(config.poll_interval(), config.confirmation_timeout());
    let events = EventReader::new(
        Arc::new(RpcEventSource::new(rpc, config.staking_contract)),
        config.deployment_block,
        config.max_block_range,
    );

    StakingCoordinator::new(
        Arc::new(reader),
        Arc::new(writer),
        events,
        Arc::new(SystemClock),
        config.staking_contract,
    )
    .with_refresh_policy(config.refresh_policy())
}

async fn print_status(coordinator: &Coordinator) {
    let summary = coordinator.summary().await;
    println!("{summary}");
    if let Some(position) = &summary.position {
        println!(
            "Position:         {:?}, started {}s, unlocks {}s",
            position.status,
            position.start_time.as_secs(),
            position.end_time.as_secs()
        );
    }
}

fn print_receipt(what: &str, receipt: &TxReceipt, explorer: &str) {
    println!("{what} in block {} ({})", receipt.block_number, receipt.tx_hash.short());
    println!("  {}", receipt.tx_hash.explorer_link(explorer));
}

fn print_history(events: &[&TransactionEvent], explorer: &str) {
    if events.is_empty() {
        println!("No staking events found");
        return;
    }
    for event in events {
        println!(
            "{:<20} {:>14} {} block {:<10} {}",
            event.kind(),
            event.payload.amount().to_fixed(2),
            event.user.short(),
            event.block_number,
            event.tx_hash.explorer_link(explorer),
        );
    }
}
