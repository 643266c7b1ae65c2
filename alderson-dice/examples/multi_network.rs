#![allow(clippy::print_stdout)]
//! Resolve every supported network and query its head block.
//!
//! Usage:
//!   cargo run --example `multi_network`
//!
//! Read clients are built without a wallet, so each one talks to the
//! network's default public RPC endpoint over HTTP. Localhost is skipped
//! unless a dev node is listening on port 8545.

use alderson_dice::{SupportedChain, create_read_client};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    for chain in SupportedChain::ALL {
        let client = create_read_client(*chain, None)?;
        let config = client.chain();

        match client.block_number().await {
            Ok(block) => println!(
                "[{}] chain_id={} rpc={} block={block}",
                config.name,
                config.chain_id(),
                client.transport(),
            ),
            Err(e) => println!("[{}] unreachable: {e}", config.name),
        }
    }

    Ok(())
}
