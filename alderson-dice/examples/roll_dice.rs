#![allow(clippy::print_stdout)]
//! Roll a die through a node-managed wallet.
//!
//! Usage:
//!   cargo run --example `roll_dice` -- <game-address> <artifact.json> <dice-id>
//!
//! Expects a local dev node (anvil, hardhat) on `http://127.0.0.1:8545` with
//! unlocked accounts. The node stands in for an injected browser wallet: it
//! answers `eth_requestAccounts` and signs `eth_sendTransaction` itself.

use alderson_dice::{
    Address, ClientFactory, ContractAbi, NodeProvider, ProviderHandle, SupportedChain, bind,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(address), Some(artifact), Some(dice_id)) = (args.next(), args.next(), args.next())
    else {
        return Err("usage: roll_dice <game-address> <artifact.json> <dice-id>".into());
    };

    let address: Address = address.parse()?;
    let abi = ContractAbi::from_json(&std::fs::read_to_string(artifact)?)?;

    let wallet = ProviderHandle::new(NodeProvider::connect_http(
        SupportedChain::Localhost.config().default_rpc().parse()?,
    ));
    let factory = ClientFactory::default();
    let read = factory.create_read_client(SupportedChain::Localhost, Some(wallet.clone()))?;
    let write = factory.create_write_client(SupportedChain::Localhost, Some(wallet))?;

    write.ensure_chain().await?;
    let player = write
        .request_addresses()
        .await?
        .first()
        .copied()
        .ok_or("node has no unlocked accounts")?;

    let game = bind(read, Some(write), address, abi);
    let player_arg = player.to_string();
    let call_args = game.parse_args("roll", &[dice_id.as_str(), player_arg.as_str()])?;

    let gas = game.estimate_gas("roll", &call_args, player).await?;
    let hash = game.write("roll", &call_args, player).await?;
    println!("rolled as {player}: tx {hash} (estimated gas {gas})");

    Ok(())
}
