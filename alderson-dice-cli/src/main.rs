//! Alderson Dice operator CLI.
//!
//! Resolves supported chains, queries them and drives the game and NFT
//! contracts of a configured deployment.
//!
//! # Usage
//!
//! ```bash
//! # List supported chains
//! alderson-dice chains
//!
//! # Resolve a wallet-style chain ID
//! alderson-dice resolve 0xa4b1
//!
//! # Read from the game contract configured in alderson.toml
//! alderson-dice read --chain 42161 totalSupply
//!
//! # Roll a die on a local dev node, signing with its unlocked account
//! alderson-dice write --chain 1337 --wallet-rpc http://127.0.0.1:8545 roll 1 0xf39F...2266
//!
//! # Dump Rolled events, then keep following new ones
//! alderson-dice events --chain 42161 Rolled --from-block 250000000 --follow
//! ```

use std::future::Future;
use std::path::PathBuf;

use alderson_dice::{
    Address, ChainId, ClientFactory, ContractHandle, ContractKind, NodeProvider, ProviderHandle,
    SupportedChain, U256, bind,
};
use alderson_dice_cli::config::Config;
use alderson_dice_cli::events::{self, REQUEST_TIMEOUT};
use alderson_dice_cli::display;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use url::Url;

/// Alderson Dice chain and contract tool.
#[derive(Debug, Parser)]
#[command(name = "alderson-dice", version, about)]
struct Cli {
    /// Deployment configuration file.
    #[arg(long, global = true, default_value = "alderson.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// List supported chains.
    Chains,

    /// Show the configuration a chain ID resolves to.
    Resolve {
        /// Chain ID, hex (`0xa4b1`) or decimal (`42161`).
        chain: ChainId,
    },

    /// Print the latest block number.
    BlockNumber {
        #[command(flatten)]
        network: Network,
    },

    /// Print new block hashes as they arrive.
    Watch {
        #[command(flatten)]
        network: Network,

        /// Stop after this many polls.
        #[arg(long, default_value_t = 5)]
        polls: usize,
    },

    /// Request the wallet's accounts and check it is on the right chain.
    Accounts {
        #[command(flatten)]
        network: Network,
    },

    /// Call a contract function with `eth_call`.
    Read {
        #[command(flatten)]
        target: Target,

        /// Function name.
        function: String,

        /// Function arguments, in ABI order.
        args: Vec<String>,

        /// Simulate as this sender.
        #[arg(long)]
        from: Option<Address>,
    },

    /// Submit a transaction signed by the wallet.
    Write {
        #[command(flatten)]
        target: Target,

        /// Function name.
        function: String,

        /// Function arguments, in ABI order.
        args: Vec<String>,

        /// Sender; defaults to the wallet's first account.
        #[arg(long)]
        from: Option<Address>,

        /// Native value to attach, in wei.
        #[arg(long)]
        value: Option<U256>,
    },

    /// Dump a contract's event logs.
    Events {
        #[command(flatten)]
        target: Target,

        /// Event name.
        event: String,

        /// First block to search.
        #[arg(long, default_value_t = 0)]
        from_block: u64,

        /// Last block to search; defaults to the chain head.
        #[arg(long)]
        to_block: Option<u64>,

        /// Keep printing new events as they are emitted.
        #[arg(long)]
        follow: bool,
    },
}

/// Chain selection and optional wallet.
#[derive(Debug, Clone, Args)]
struct Network {
    /// Chain ID, hex or decimal.
    #[arg(long)]
    chain: ChainId,

    /// RPC endpoint acting as the wallet (node-managed accounts). Required
    /// for signing.
    #[arg(long)]
    wallet_rpc: Option<Url>,
}

/// A configured contract on a chain.
#[derive(Debug, Clone, Args)]
struct Target {
    #[command(flatten)]
    network: Network,

    /// Which contract to bind.
    #[arg(long, default_value = "game")]
    contract: ContractKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Chains => {
            cmd_chains();
            Ok(())
        }
        Command::Resolve { chain } => cmd_resolve(chain),
        Command::BlockNumber { network } => cmd_block_number(&config, &network).await,
        Command::Watch { network, polls } => cmd_watch(&config, &network, polls).await,
        Command::Accounts { network } => cmd_accounts(&config, &network).await,
        Command::Read {
            target,
            function,
            args,
            from,
        } => cmd_read(&config, &target, &function, &args, from).await,
        Command::Write {
            target,
            function,
            args,
            from,
            value,
        } => cmd_write(&config, &target, &function, &args, from, value).await,
        Command::Events {
            target,
            event,
            from_block,
            to_block,
            follow,
        } => cmd_events(&config, &target, &event, from_block, to_block, follow).await,
    }
}

/// Bound a library call by the request timeout.
async fn timed<T>(fut: impl Future<Output = alderson_dice::Result<T>>) -> Result<T> {
    Ok(tokio::time::timeout(REQUEST_TIMEOUT, fut)
        .await
        .context("request timed out")??)
}

impl Network {
    fn wallet(&self) -> Option<ProviderHandle> {
        self.wallet_rpc.clone().map(|url| {
            tracing::debug!(rpc = %url, "using node wallet");
            ProviderHandle::new(NodeProvider::connect_http(url))
        })
    }

    fn factory(&self, config: &Config) -> ClientFactory {
        ClientFactory::new(config.client_options(self.chain.get()))
    }
}

/// Bind the configured contract, with a write side when a wallet is given.
fn bind_target(config: &Config, target: &Target) -> Result<ContractHandle> {
    let network = &target.network;
    let chain = alderson_dice::resolve(network.chain)?;
    let entry = config.contract(chain.chain_id(), target.contract)?;
    let abi = config.load_abi(entry)?;

    let factory = network.factory(config);
    let wallet = network.wallet();
    let read = factory.create_read_client(network.chain, wallet.clone())?;
    let write = wallet
        .map(|w| factory.create_write_client(network.chain, Some(w)))
        .transpose()?;

    Ok(bind(read, write, entry.address, abi))
}

/// Execute the `chains` subcommand.
#[allow(clippy::print_stdout)]
fn cmd_chains() {
    println!(
        "{:<12} {:<14} {:<8} {:<10} RPC",
        "Chain ID", "Name", "Symbol", "Multicall"
    );
    println!("{}", "-".repeat(80));

    for chain in SupportedChain::ALL {
        let config = chain.config();
        println!(
            "{:<12} {:<14} {:<8} {:<10} {}",
            config.chain_id(),
            config.name,
            config.native_currency.symbol,
            if config.multicall3 { "yes" } else { "no" },
            config.default_rpc(),
        );
    }
}

/// Execute the `resolve` subcommand.
#[allow(clippy::print_stdout)]
fn cmd_resolve(chain: ChainId) -> Result<()> {
    let config = alderson_dice::resolve(chain)?;
    println!("name:      {}", config.name);
    println!("chain id:  {} ({chain})", config.chain_id());
    println!(
        "currency:  {} ({}, {} decimals)",
        config.native_currency.name, config.native_currency.symbol, config.native_currency.decimals
    );
    for url in config.default_rpc_urls {
        println!("rpc:       {url}");
    }
    if let Some(explorer) = config.block_explorer {
        println!("explorer:  {explorer}");
    }
    println!("multicall: {}", config.multicall3);
    Ok(())
}

/// Execute the `block-number` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_block_number(config: &Config, network: &Network) -> Result<()> {
    let client = network
        .factory(config)
        .create_read_client(network.chain, network.wallet())?;
    let block = timed(client.block_number()).await?;
    tracing::debug!(chain_id = client.chain().chain_id(), transport = %client.transport(), "queried");
    println!("{block}");
    Ok(())
}

/// Execute the `watch` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_watch(config: &Config, network: &Network, polls: usize) -> Result<()> {
    let client = network
        .factory(config)
        .create_read_client(network.chain, network.wallet())?;
    let chain_id = client.chain().chain_id();

    tracing::info!(chain_id, polls, "watching blocks");
    let mut blocks = timed(client.watch_blocks()).await?.take(polls);
    while let Some(hashes) = blocks.next().await {
        for hash in hashes {
            println!("{hash}");
        }
    }
    Ok(())
}

/// Execute the `accounts` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_accounts(config: &Config, network: &Network) -> Result<()> {
    let write = network
        .factory(config)
        .create_write_client(network.chain, network.wallet())
        .context("--wallet-rpc is required")?;

    timed(write.ensure_chain()).await?;
    for account in timed(write.request_addresses()).await? {
        println!("{account}");
    }
    Ok(())
}

/// Execute the `read` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_read(
    config: &Config,
    target: &Target,
    function: &str,
    args: &[String],
    from: Option<Address>,
) -> Result<()> {
    let handle = bind_target(config, target)?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let values = handle.parse_args(function, &args)?;

    let outputs = match from {
        Some(from) => timed(handle.simulate(function, &values, from)).await?,
        None => {
            if !handle.is_read_only(function)? {
                tracing::warn!(function, "state-changing function called without --from");
            }
            timed(handle.read(function, &values)).await?
        }
    };
    println!("{}", display::outputs(&outputs));
    Ok(())
}

/// Execute the `write` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_write(
    config: &Config,
    target: &Target,
    function: &str,
    args: &[String],
    from: Option<Address>,
    value: Option<U256>,
) -> Result<()> {
    let handle = bind_target(config, target)?;
    let write = handle
        .clients()
        .require_write()
        .context("--wallet-rpc is required to sign")?;
    timed(write.ensure_chain()).await?;

    let from = match from {
        Some(from) => from,
        None => timed(write.request_addresses())
            .await?
            .first()
            .copied()
            .context("wallet returned no accounts")?,
    };

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let values = handle.parse_args(function, &args)?;
    let value = value.unwrap_or_default();

    let gas = timed(handle.estimate_gas(function, &values, from)).await?;
    tracing::info!(function, %from, %value, gas, "submitting");

    let hash = timed(handle.write_with_value(function, &values, from, value)).await?;
    println!("{hash}");
    Ok(())
}

/// Execute the `events` subcommand.
#[allow(clippy::print_stdout)]
async fn cmd_events(
    config: &Config,
    target: &Target,
    event: &str,
    from_block: u64,
    to_block: Option<u64>,
    follow: bool,
) -> Result<()> {
    let handle = bind_target(config, target)?;
    let to = match to_block {
        Some(to) => to,
        None => timed(handle.clients().read().block_number()).await?,
    };

    for log in events::fetch(&handle, event, from_block, to).await? {
        println!("{}", display::log_line(&log));
    }

    if follow {
        tracing::info!(event, "following new events");
        let mut logs = timed(handle.watch_events(event)).await?;
        while let Some(log) = logs.next().await {
            println!("{}", display::log_line(&log));
        }
    }
    Ok(())
}
