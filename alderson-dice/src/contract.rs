//! Contract bindings over a client pair.
//!
//! A [`ContractHandle`] pairs [`Clients`] with a fixed address and ABI.
//! Reads (`eth_call`, gas estimation, logs) go through the read client;
//! transactions go through the write client. Nothing is validated at bind
//! time: an unknown function or a malformed argument surfaces when the call
//! is made, as [`Error::InvalidArgument`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::contract::{ContractInstance, Interface};
use alloy::dyn_abi::{DynSolValue, Specifier};
use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;

use crate::client::{Clients, ReadClient, WriteClient};
use crate::error::{Error, Result};

/// The two Alderson Dice contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractKind {
    /// The game contract (`AldersonDiceGameV0`).
    Game,
    /// The dice NFT contract (`AldersonDiceNFT`).
    Nft,
}

impl ContractKind {
    /// Both contracts.
    pub const ALL: &[Self] = &[Self::Game, Self::Nft];

    /// Short name used in configuration and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Nft => "nft",
        }
    }

    /// Name of the compiler artifact holding the ABI.
    #[must_use]
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::Game => "AldersonDiceGameV0",
            Self::Nft => "AldersonDiceNFT",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::invalid(format!("unknown contract `{s}` (expected game or nft)")))
    }
}

/// A parsed contract ABI, cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAbi(Arc<JsonAbi>);

impl ContractAbi {
    /// Wrap an already-parsed ABI.
    #[must_use]
    pub fn new(abi: JsonAbi) -> Self {
        Self(Arc::new(abi))
    }

    /// Parse an ABI from JSON: either a bare ABI array or a compiler artifact
    /// object with an `abi` member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the JSON is neither.
    pub fn from_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Source {
            Bare(JsonAbi),
            Artifact { abi: JsonAbi },
        }

        match serde_json::from_str::<Source>(json) {
            Ok(Source::Bare(abi) | Source::Artifact { abi }) => Ok(Self::new(abi)),
            Err(e) => Err(Error::invalid(format!(
                "expected an ABI array or an artifact with an `abi` field: {e}"
            ))),
        }
    }

    /// The parsed ABI.
    #[must_use]
    pub fn abi(&self) -> &JsonAbi {
        &self.0
    }

    /// First overload of `name` taking `arity` arguments.
    fn function(&self, name: &str, arity: usize) -> Result<&Function> {
        let overloads = self
            .0
            .function(name)
            .ok_or_else(|| Error::invalid(format!("unknown function `{name}`")))?;
        overloads
            .iter()
            .find(|f| f.inputs.len() == arity)
            .ok_or_else(|| {
                Error::invalid(format!("no overload of `{name}` takes {arity} argument(s)"))
            })
    }
}

/// Bind a contract to a read client and an optional write client.
///
/// Without a write client the handle is read-only and [`ContractHandle::write`]
/// fails with [`Error::MissingProvider`].
#[must_use]
pub fn bind(
    read: ReadClient,
    write: Option<WriteClient>,
    address: Address,
    abi: ContractAbi,
) -> ContractHandle {
    let clients = match write {
        None => Clients::ReadOnly(read),
        Some(write) => Clients::ReadWrite(read, write),
    };
    ContractHandle::new(clients, address, abi)
}

/// Shorthand for [`bind`] without a write client.
#[must_use]
pub fn bind_read_only(read: ReadClient, address: Address, abi: ContractAbi) -> ContractHandle {
    bind(read, None, address, abi)
}

/// A contract bound to a client pair.
#[derive(Clone)]
pub struct ContractHandle {
    clients: Clients,
    address: Address,
    abi: ContractAbi,
    reader: ContractInstance<DynProvider>,
    writer: Option<ContractInstance<DynProvider>>,
}

impl ContractHandle {
    /// Bind `address` and `abi` to `clients`.
    #[must_use]
    pub fn new(clients: Clients, address: Address, abi: ContractAbi) -> Self {
        let instance = |provider: &DynProvider| {
            ContractInstance::new(
                address,
                provider.clone(),
                Interface::new(abi.abi().clone()),
            )
        };
        let reader = instance(clients.read().provider());
        let writer = clients.write().map(|write| instance(write.provider()));

        tracing::debug!(
            chain_id = clients.chain().chain_id(),
            %address,
            writable = writer.is_some(),
            "contract bound"
        );

        Self {
            clients,
            address,
            abi,
            reader,
            writer,
        }
    }

    /// The contract address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The contract ABI.
    #[must_use]
    pub const fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// The clients this handle routes through.
    #[must_use]
    pub const fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Whether the handle can submit transactions.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// Whether `function` is `view` or `pure`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the ABI has no such function.
    pub fn is_read_only(&self, function: &str) -> Result<bool> {
        let overloads = self
            .abi
            .abi()
            .function(function)
            .ok_or_else(|| Error::invalid(format!("unknown function `{function}`")))?;
        Ok(overloads.iter().all(|f| {
            matches!(
                f.state_mutability,
                StateMutability::View | StateMutability::Pure
            )
        }))
    }

    /// Coerce string arguments to the input types `function` declares.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown function, a wrong
    /// number of arguments, or a value that does not parse as its type.
    pub fn parse_args(&self, function: &str, args: &[&str]) -> Result<Vec<DynSolValue>> {
        let func = self.abi.function(function, args.len())?;
        func.inputs
            .iter()
            .zip(args)
            .map(|(param, raw)| {
                let ty = param
                    .resolve()
                    .map_err(|e| Error::invalid(format!("{function}: {e}")))?;
                ty.coerce_str(raw).map_err(|e| {
                    Error::invalid(format!("{function}({}): {e}", param.name))
                })
            })
            .collect()
    }

    /// Call a function with `eth_call` and decode its outputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown function or
    /// arguments that do not match it, and an RPC error if the call fails.
    pub async fn read(&self, function: &str, args: &[DynSolValue]) -> Result<Vec<DynSolValue>> {
        Ok(self.reader.function(function, args)?.call().await?)
    }

    /// Simulate a state-changing call as `from`, without submitting it.
    ///
    /// # Errors
    ///
    /// As [`ContractHandle::read`]; a revert is returned as an RPC error.
    pub async fn simulate(
        &self,
        function: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<Vec<DynSolValue>> {
        Ok(self
            .reader
            .function(function, args)?
            .from(from)
            .call()
            .await?)
    }

    /// Estimate the gas a call from `from` would use.
    ///
    /// # Errors
    ///
    /// As [`ContractHandle::read`].
    pub async fn estimate_gas(
        &self,
        function: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<u64> {
        Ok(self
            .reader
            .function(function, args)?
            .from(from)
            .estimate_gas()
            .await?)
    }

    /// A log filter matching `event` emitted by this contract, with no block
    /// range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the ABI has no such event.
    pub fn event_filter(&self, event: &str) -> Result<Filter> {
        let selector = self
            .abi
            .abi()
            .event(event)
            .and_then(|overloads| overloads.first())
            .map(alloy::json_abi::Event::selector)
            .ok_or_else(|| Error::invalid(format!("unknown event `{event}`")))?;

        Ok(Filter::new()
            .address(self.address)
            .event_signature(selector))
    }

    /// Logs emitted by this contract for `event`, from `from_block` up to
    /// `to_block` (or the chain head).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the ABI has no such event.
    pub async fn get_events(
        &self,
        event: &str,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<Log>> {
        let mut filter = self.event_filter(event)?.from_block(from_block);
        if let Some(to) = to_block {
            filter = filter.to_block(to);
        }

        Ok(self.clients.read().provider().get_logs(&filter).await?)
    }

    /// Stream `event` logs as they are emitted, polling an `eth_newFilter`
    /// filter through the read client.
    ///
    /// The stream ends when the last clone of this handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the ABI has no such event, or a
    /// transport error if the filter cannot be installed.
    pub async fn watch_events(&self, event: &str) -> Result<BoxStream<'static, Log>> {
        let filter = self.event_filter(event)?;
        let poller = self.clients.read().provider().watch_logs(&filter).await?;

        tracing::debug!(
            chain_id = self.clients.chain().chain_id(),
            contract = %self.address,
            event,
            "watching events"
        );
        Ok(poller
            .into_stream()
            .flat_map(futures::stream::iter)
            .boxed())
    }

    /// Submit a transaction calling `function`, signed by the wallet as
    /// `from`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingProvider`] on a read-only handle and
    /// [`Error::Provider`] if the user rejects the transaction.
    pub async fn write(
        &self,
        function: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<TxHash> {
        self.write_with_value(function, args, from, U256::ZERO).await
    }

    /// [`ContractHandle::write`] with native value attached, for payable
    /// functions.
    ///
    /// # Errors
    ///
    /// As [`ContractHandle::write`].
    pub async fn write_with_value(
        &self,
        function: &str,
        args: &[DynSolValue],
        from: Address,
        value: U256,
    ) -> Result<TxHash> {
        let writer = self.writer.as_ref().ok_or(Error::MissingProvider)?;
        let pending = writer
            .function(function, args)?
            .from(from)
            .value(value)
            .send()
            .await?;
        let hash = *pending.tx_hash();

        tracing::info!(
            chain_id = self.clients.chain().chain_id(),
            contract = %self.address,
            function,
            %hash,
            "transaction submitted"
        );
        Ok(hash)
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}
