#![allow(clippy::print_stdout)]
//! Bind the game contract read-only and query it.
//!
//! Usage:
//!   cargo run --example `read_game` -- <chain-id> <game-address> <artifact.json>
//!
//! The chain ID may be hex (`0xa4b1`) or decimal (`42161`). The artifact is
//! the compiler output for `AldersonDiceGameV0` (or a bare ABI array).

use alderson_dice::{Address, ChainId, ContractAbi, bind_read_only, create_read_client};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(chain), Some(address), Some(artifact)) = (args.next(), args.next(), args.next())
    else {
        return Err("usage: read_game <chain-id> <game-address> <artifact.json>".into());
    };

    let chain_id: ChainId = chain.parse()?;
    let address: Address = address.parse()?;
    let abi = ContractAbi::from_json(&std::fs::read_to_string(artifact)?)?;

    let read = create_read_client(chain_id, None)?;
    println!("{} via {}", read.chain().name, read.transport());

    let game = bind_read_only(read, address, abi);
    let supply = game.read("totalSupply", &[]).await?;
    println!("totalSupply = {supply:?}");

    Ok(())
}
