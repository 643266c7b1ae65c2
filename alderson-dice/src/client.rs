//! Read and write client construction.
//!
//! [`ClientFactory`] resolves a chain identifier, picks the transport policy
//! and hands back immutable handles:
//!
//! | client | provider | transport |
//! |--------|----------|-----------|
//! | read   | absent   | `Http(fallback_url)` |
//! | read   | present  | `Fallback([InjectedProvider, Http(fallback_url)])` |
//! | write  | present  | `InjectedProvider` |
//! | write  | absent   | [`Error::MissingProvider`] |
//!
//! A handle never changes chain or transport after construction; switching
//! networks means building a new one.

use std::borrow::Cow;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use futures::StreamExt;
use futures::stream::BoxStream;
use url::Url;

use crate::chains::{self, ChainConfig, ChainId};
use crate::eip1193::ProviderHandle;
use crate::error::{Error, Result};
use crate::transport::{TransportDescriptor, TransportKind};

/// Client construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// HTTP endpoint used by read clients. Defaults to the chain's first
    /// public RPC endpoint.
    pub fallback_url: Option<Url>,
    /// Coalesce `eth_call`s into Multicall3 batches on chains that have it.
    pub multicall: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            fallback_url: None,
            multicall: true,
        }
    }
}

impl ClientOptions {
    /// Override the HTTP endpoint used by read clients.
    #[must_use]
    pub fn with_fallback_url(mut self, url: Url) -> Self {
        self.fallback_url = Some(url);
        self
    }

    /// Enable or disable multicall batching.
    #[must_use]
    pub const fn with_multicall(mut self, enabled: bool) -> Self {
        self.multicall = enabled;
        self
    }
}

/// Builds [`ReadClient`]s and [`WriteClient`]s.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    options: ClientOptions,
}

impl ClientFactory {
    /// Create a factory with the given options.
    #[must_use]
    pub const fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    /// The options this factory was built with.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The HTTP endpoint read clients use on `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the chain's default endpoint is
    /// not a valid URL.
    pub fn fallback_url(&self, chain: &ChainConfig) -> Result<Url> {
        if let Some(url) = &self.options.fallback_url {
            return Ok(url.clone());
        }
        chain
            .default_rpc()
            .parse()
            .map_err(|e| Error::invalid(format!("default RPC for {}: {e}", chain.name)))
    }

    /// Build a read-only client.
    ///
    /// Without a provider, reads go straight to the fallback HTTP endpoint.
    /// With one, the provider is tried first and the HTTP endpoint backs it
    /// up, so a slow or disconnected wallet does not block reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedChain`] for an unknown chain.
    pub fn create_read_client(
        &self,
        chain_id: impl Into<ChainId>,
        provider: Option<ProviderHandle>,
    ) -> Result<ReadClient> {
        let chain = chains::resolve(chain_id)?;
        let http = TransportDescriptor::Http(self.fallback_url(chain)?);
        let transport = match provider {
            None => http,
            Some(provider) => TransportDescriptor::Fallback(vec![
                TransportDescriptor::InjectedProvider(provider),
                http,
            ]),
        };
        ReadClient::new(chain, transport, self.options.multicall && chain.multicall3)
    }

    /// Build a signing client over the injected provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingProvider`] without a provider, whatever the
    /// chain, and [`Error::UnsupportedChain`] for an unknown chain.
    pub fn create_write_client(
        &self,
        chain_id: impl Into<ChainId>,
        provider: Option<ProviderHandle>,
    ) -> Result<WriteClient> {
        let provider = provider.ok_or(Error::MissingProvider)?;
        let chain = chains::resolve(chain_id)?;
        WriteClient::new(chain, provider)
    }

    /// Build the client pair for a chain: read-only without a provider,
    /// read/write with one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedChain`] for an unknown chain.
    pub fn create_clients(
        &self,
        chain_id: impl Into<ChainId>,
        provider: Option<ProviderHandle>,
    ) -> Result<Clients> {
        let chain_id = chain_id.into();
        let read = self.create_read_client(chain_id, provider.clone())?;
        match provider {
            None => Ok(Clients::ReadOnly(read)),
            Some(provider) => {
                let write = self.create_write_client(chain_id, Some(provider))?;
                Ok(Clients::ReadWrite(read, write))
            }
        }
    }
}

/// [`ClientFactory::create_read_client`] with default options.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChain`] for an unknown chain.
pub fn create_read_client(
    chain_id: impl Into<ChainId>,
    provider: Option<ProviderHandle>,
) -> Result<ReadClient> {
    ClientFactory::default().create_read_client(chain_id, provider)
}

/// [`ClientFactory::create_write_client`] with default options.
///
/// # Errors
///
/// Returns [`Error::MissingProvider`] without a provider and
/// [`Error::UnsupportedChain`] for an unknown chain.
pub fn create_write_client(
    chain_id: impl Into<ChainId>,
    provider: Option<ProviderHandle>,
) -> Result<WriteClient> {
    ClientFactory::default().create_write_client(chain_id, provider)
}

/// Public client: queries chain state, cannot sign.
#[derive(Clone)]
pub struct ReadClient {
    chain: &'static ChainConfig,
    transport: TransportDescriptor,
    multicall: bool,
    provider: DynProvider,
}

impl ReadClient {
    /// Build a read client over an explicit transport.
    ///
    /// Call batching runs a background task on the current Tokio runtime.
    /// Outside a runtime the client is built without batching and
    /// [`ReadClient::multicall`] reports `false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the transport cannot be built
    /// (e.g. an empty fallback list).
    pub fn new(
        chain: &'static ChainConfig,
        transport: TransportDescriptor,
        multicall: bool,
    ) -> Result<Self> {
        let client = transport.connect()?;
        let in_runtime = tokio::runtime::Handle::try_current().is_ok();
        if multicall && !in_runtime {
            tracing::warn!(
                chain_id = chain.chain_id(),
                "no tokio runtime, multicall batching disabled"
            );
        }
        let multicall = multicall && in_runtime;
        let provider = if multicall {
            ProviderBuilder::new()
                .with_call_batching()
                .connect_client(client)
                .erased()
        } else {
            ProviderBuilder::new().connect_client(client).erased()
        };

        tracing::debug!(
            chain_id = chain.chain_id(),
            transport = %transport,
            multicall,
            "read client created"
        );

        Ok(Self {
            chain,
            transport,
            multicall,
            provider,
        })
    }

    /// The chain this client is bound to.
    #[must_use]
    pub const fn chain(&self) -> &'static ChainConfig {
        self.chain
    }

    /// The transport this client was built with.
    #[must_use]
    pub const fn transport(&self) -> &TransportDescriptor {
        &self.transport
    }

    /// Shorthand for `self.transport().kind()`.
    #[must_use]
    pub const fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Whether calls are batched through Multicall3.
    #[must_use]
    pub const fn multicall(&self) -> bool {
        self.multicall
    }

    /// The underlying provider, for requests this crate does not wrap.
    #[must_use]
    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Latest block number.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC request fails.
    pub async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    /// Chain ID reported by the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC request fails.
    pub async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    /// Stream of new block hashes, polled through a block filter.
    ///
    /// The stream ends when the client is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the block filter cannot be installed.
    pub async fn watch_blocks(&self) -> Result<BoxStream<'static, Vec<B256>>> {
        let poller = self.provider.watch_blocks().await?;
        tracing::debug!(chain_id = self.chain.chain_id(), "watching blocks");
        Ok(poller.into_stream().boxed())
    }
}

impl std::fmt::Debug for ReadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadClient")
            .field("chain", &self.chain.name)
            .field("transport", &self.transport)
            .field("multicall", &self.multicall)
            .finish_non_exhaustive()
    }
}

/// Wallet client: submits transactions signed by the injected provider.
#[derive(Clone)]
pub struct WriteClient {
    chain: &'static ChainConfig,
    transport: TransportDescriptor,
    provider: DynProvider,
}

impl WriteClient {
    /// Build a write client over `wallet`. Writes always go to the wallet
    /// directly; there is no HTTP fallback for signing.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn new(chain: &'static ChainConfig, wallet: ProviderHandle) -> Result<Self> {
        let transport = TransportDescriptor::InjectedProvider(wallet);
        // The wallet fills nonce, gas and fees itself.
        let provider = RootProvider::<Ethereum>::new(transport.connect()?).erased();

        tracing::debug!(
            chain_id = chain.chain_id(),
            transport = %transport,
            "write client created"
        );

        Ok(Self {
            chain,
            transport,
            provider,
        })
    }

    /// The chain this client is bound to.
    #[must_use]
    pub const fn chain(&self) -> &'static ChainConfig {
        self.chain
    }

    /// The transport this client was built with. Always
    /// [`TransportDescriptor::InjectedProvider`].
    #[must_use]
    pub const fn transport(&self) -> &TransportDescriptor {
        &self.transport
    }

    /// Shorthand for `self.transport().kind()`.
    #[must_use]
    pub const fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// The underlying provider, for requests this crate does not wrap.
    #[must_use]
    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Ask the wallet for account access (`eth_requestAccounts`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the user rejects the request.
    pub async fn request_addresses(&self) -> Result<Vec<Address>> {
        let accounts: Vec<Address> = self
            .provider
            .raw_request(Cow::Borrowed("eth_requestAccounts"), ())
            .await?;
        tracing::debug!(accounts = accounts.len(), "wallet accounts");
        Ok(accounts)
    }

    /// Chain ID the wallet is currently on.
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet request fails.
    pub async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    /// Check that the wallet is on this client's chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChainMismatch`] if the wallet reports another chain.
    pub async fn ensure_chain(&self) -> Result<()> {
        let expected = self.chain.chain_id();
        let actual = self.chain_id().await?;
        if actual != expected {
            return Err(Error::ChainMismatch { expected, actual });
        }
        Ok(())
    }

    /// Submit a transaction for the wallet to sign and broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the user rejects the transaction.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        tracing::info!(chain_id = self.chain.chain_id(), %hash, "transaction submitted");
        Ok(hash)
    }
}

impl std::fmt::Debug for WriteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteClient")
            .field("chain", &self.chain.name)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// The capabilities available to a contract binding.
#[derive(Debug, Clone)]
pub enum Clients {
    /// Reads only.
    ReadOnly(ReadClient),
    /// Reads through the first client, writes through the second.
    ReadWrite(ReadClient, WriteClient),
}

impl Clients {
    /// Pair a read client with a write client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the clients are bound to
    /// different chains.
    pub fn read_write(read: ReadClient, write: WriteClient) -> Result<Self> {
        if read.chain().chain_id() != write.chain().chain_id() {
            return Err(Error::invalid(format!(
                "read client is on {} but write client is on {}",
                read.chain().name,
                write.chain().name
            )));
        }
        Ok(Self::ReadWrite(read, write))
    }

    /// The read side.
    #[must_use]
    pub const fn read(&self) -> &ReadClient {
        match self {
            Self::ReadOnly(read) | Self::ReadWrite(read, _) => read,
        }
    }

    /// The write side, if any.
    #[must_use]
    pub const fn write(&self) -> Option<&WriteClient> {
        match self {
            Self::ReadOnly(_) => None,
            Self::ReadWrite(_, write) => Some(write),
        }
    }

    /// The write side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingProvider`] for a read-only pair.
    pub fn require_write(&self) -> Result<&WriteClient> {
        match self {
            Self::ReadOnly(_) => Err(Error::MissingProvider),
            Self::ReadWrite(_, write) => Ok(write),
        }
    }

    /// The chain both sides are bound to.
    #[must_use]
    pub const fn chain(&self) -> &'static ChainConfig {
        self.read().chain()
    }
}

impl From<ReadClient> for Clients {
    fn from(read: ReadClient) -> Self {
        Self::ReadOnly(read)
    }
}
