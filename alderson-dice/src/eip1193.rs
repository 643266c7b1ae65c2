//! Injected wallet providers.
//!
//! A wallet is consumed through the request/response capability described by
//! [EIP-1193](https://eips.ethereum.org/EIPS/eip-1193): a single `request`
//! method taking a JSON-RPC method name and parameters. Providers discovered
//! through [EIP-6963](https://eips.ethereum.org/EIPS/eip-6963) also announce
//! a [`ProviderInfo`].

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use alloy::providers::{DynProvider, Provider};
use alloy::rpc::json_rpc::ErrorPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by an EIP-1193 provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    /// EIP-1193 or JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload (e.g. revert data).
    pub data: Option<Value>,
}

impl ProviderRpcError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested method or account has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the requested method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The provider is not connected to the requested chain.
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// The user rejected the request (CAIP-25 wallets).
    pub const CAIP_USER_REJECTED: i64 = 5000;
    /// The node rejected the transaction (EIP-1474).
    pub const TRANSACTION_REJECTED: i64 = -32003;
    /// The call reverted (geth and most nodes).
    pub const EXECUTION_REVERTED: i64 = 3;

    /// Create an error without a data payload.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Convert a JSON-RPC error response. A `data` member that is not valid
    /// JSON is dropped.
    #[must_use]
    pub fn from_payload(payload: &ErrorPayload) -> Self {
        Self {
            code: payload.code,
            message: payload.message.to_string(),
            data: payload
                .data
                .as_ref()
                .and_then(|raw| serde_json::from_str(raw.get()).ok()),
        }
    }

    /// Whether the provider could not reach any chain, as opposed to
    /// answering the request with an error.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self.code, Self::DISCONNECTED | Self::CHAIN_DISCONNECTED)
    }

    /// Whether asking another endpoint would give the same answer: the user
    /// said no, or the transaction itself is invalid or reverts. Any other
    /// error (unsupported method, unauthorized, rate limit) may be served
    /// elsewhere.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        is_terminal_error(self.code, &self.message)
    }
}

/// [`ProviderRpcError::is_terminal`] over a raw code and message.
pub(crate) fn is_terminal_error(code: i64, message: &str) -> bool {
    matches!(
        code,
        ProviderRpcError::USER_REJECTED
            | ProviderRpcError::CAIP_USER_REJECTED
            | ProviderRpcError::TRANSACTION_REJECTED
            | ProviderRpcError::EXECUTION_REVERTED
    ) || message.to_ascii_lowercase().contains("revert")
}

/// Wallet metadata announced through `eip6963:announceProvider`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Per-session UUIDv4 identifying the provider instance.
    pub uuid: String,
    /// Wallet display name.
    pub name: String,
    /// Data URI of the wallet icon.
    pub icon: String,
    /// Reverse-DNS identifier of the wallet (e.g. `"io.metamask"`).
    pub rdns: String,
}

/// The request capability of an injected wallet provider.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Submit a JSON-RPC request to the wallet.
    ///
    /// `params` is the JSON `params` member; [`Value::Null`] means no
    /// parameters.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// EIP-6963 announcement metadata, when the provider was discovered
    /// that way.
    fn info(&self) -> Option<&ProviderInfo> {
        None
    }
}

/// Shared handle to an injected provider.
#[derive(Clone)]
pub struct ProviderHandle(Arc<dyn Eip1193Provider>);

impl ProviderHandle {
    /// Wrap a provider implementation.
    pub fn new(provider: impl Eip1193Provider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    /// Forward a request to the underlying provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`ProviderRpcError`] unchanged.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.0.request(method, params).await
    }

    /// EIP-6963 metadata of the underlying provider.
    #[must_use]
    pub fn info(&self) -> Option<&ProviderInfo> {
        self.0.info()
    }

    /// Name used in logs: the announced wallet name, or `"injected"`.
    #[must_use]
    pub fn label(&self) -> &str {
        self.info().map_or("injected", |info| info.name.as_str())
    }

    /// Whether both handles point at the same provider instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Arc<dyn Eip1193Provider>> for ProviderHandle {
    fn from(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self(provider)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("label", &self.label())
            .finish_non_exhaustive()
    }
}

/// An [`Eip1193Provider`] backed by a plain RPC endpoint.
///
/// Signing requests (`eth_sendTransaction`, `eth_requestAccounts`) are
/// answered by the node itself, which covers dev nodes with unlocked accounts
/// and desktop wallets that expose an RPC port.
#[derive(Clone)]
pub struct NodeProvider {
    provider: DynProvider,
    info: Option<ProviderInfo>,
}

impl NodeProvider {
    /// Wrap an existing provider.
    #[must_use]
    pub const fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            info: None,
        }
    }

    /// Connect over HTTP to `url`.
    #[must_use]
    pub fn connect_http(url: url::Url) -> Self {
        let provider = alloy::providers::ProviderBuilder::new()
            .connect_http(url)
            .erased();
        Self::new(provider)
    }

    /// Attach announcement metadata.
    #[must_use]
    pub fn with_info(mut self, info: ProviderInfo) -> Self {
        self.info = Some(info);
        self
    }
}

impl fmt::Debug for NodeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeProvider")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Eip1193Provider for NodeProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        // Most nodes reject a `null` params member, so send an empty array.
        let params = if params.is_null() {
            Value::Array(Vec::new())
        } else {
            params
        };
        self.provider
            .raw_request::<Value, Value>(Cow::Owned(method.to_owned()), params)
            .await
            .map_err(|e| match e.as_error_resp() {
                Some(resp) => ProviderRpcError::from_payload(resp),
                None => ProviderRpcError::new(ProviderRpcError::DISCONNECTED, e.to_string()),
            })
    }

    fn info(&self) -> Option<&ProviderInfo> {
        self.info.as_ref()
    }
}
