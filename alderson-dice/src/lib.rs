//! Chain resolution, RPC clients and contract bindings for Alderson Dice.
//!
//! The crate turns a chain identifier and an optional injected wallet into
//! ready-to-use handles:
//!
//! 1. [`chains::resolve`] maps the identifier to a static [`ChainConfig`].
//! 2. [`ClientFactory`] builds a [`ReadClient`] (direct HTTP, or the wallet
//!    backed by HTTP) and, when a wallet is present, a [`WriteClient`].
//! 3. [`bind`] attaches a contract address and ABI to the clients, giving a
//!    [`ContractHandle`] that reads through one and writes through the other.
//!
//! ```no_run
//! use alderson_dice::{ContractAbi, bind, create_read_client};
//!
//! # async fn run() -> alderson_dice::Result<()> {
//! let read = create_read_client("0xa4b1".parse::<alderson_dice::ChainId>()?, None)?;
//! let abi = ContractAbi::from_json(&std::fs::read_to_string("AldersonDiceGameV0.json").unwrap())?;
//! let game = bind(read, None, "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(), abi);
//!
//! let supply = game.read("totalSupply", &[]).await?;
//! println!("{supply:?}");
//! # Ok(())
//! # }
//! ```

pub mod chains;
pub mod client;
pub mod contract;
pub mod eip1193;
pub mod error;
pub mod transport;

pub use alloy::dyn_abi::DynSolValue;
pub use alloy::primitives::{Address, TxHash, U256};
pub use chains::{ChainConfig, ChainId, NativeCurrency, SupportedChain, resolve, resolve_str};
pub use client::{
    ClientFactory, ClientOptions, Clients, ReadClient, WriteClient, create_read_client,
    create_write_client,
};
pub use contract::{ContractAbi, ContractHandle, ContractKind, bind, bind_read_only};
pub use eip1193::{Eip1193Provider, NodeProvider, ProviderHandle, ProviderInfo, ProviderRpcError};
pub use error::{Error, Result};
pub use transport::{TransportDescriptor, TransportKind};
