//! Supported networks and their static configuration.
//!
//! The set of networks is closed: an identifier outside it resolves to
//! [`Error::UnsupportedChain`] rather than a best-effort default.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// EIP-155 chain identifier as reported by wallets (`eth_chainId`).
///
/// Parses from a `0x`-prefixed hex string or a plain decimal string. The
/// literal `0x1337` is read as Localhost (1337), not as hex 4919.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Returns the numeric chain ID.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<SupportedChain> for ChainId {
    fn from(chain: SupportedChain) -> Self {
        Self(chain.chain_id())
    }
}

/// Identifiers dev tooling reports for Localhost that do not parse to 1337.
const LOCALHOST_ALIASES: &[&str] = &["0x1337"];

impl FromStr for ChainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if LOCALHOST_ALIASES
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(trimmed))
        {
            return Ok(SupportedChain::Localhost.into());
        }
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|_| Error::UnsupportedChain(s.to_owned()))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Networks the Alderson Dice contracts can be used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedChain {
    /// Ethereum Mainnet (chain ID 1).
    Mainnet,
    /// Local development node (chain ID 1337).
    Localhost,
    /// Base Mainnet (chain ID 8453).
    Base,
    /// Arbitrum One (chain ID 42161).
    Arbitrum,
}

impl SupportedChain {
    /// All supported networks.
    pub const ALL: &[Self] = &[Self::Mainnet, Self::Localhost, Self::Base, Self::Arbitrum];

    /// Returns the EIP-155 chain ID for this network.
    #[must_use]
    pub const fn chain_id(self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Localhost => 1337,
            Self::Base => 8453,
            Self::Arbitrum => 42161,
        }
    }

    /// Look up a [`SupportedChain`] by its EIP-155 chain ID.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.iter().find(|c| c.chain_id() == chain_id).copied()
    }

    /// Returns the static configuration for this network.
    #[must_use]
    pub const fn config(self) -> &'static ChainConfig {
        match self {
            Self::Mainnet => &MAINNET,
            Self::Localhost => &LOCALHOST,
            Self::Base => &BASE,
            Self::Arbitrum => &ARBITRUM,
        }
    }
}

/// Native gas token of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeCurrency {
    /// Display name (e.g. `"Ether"`).
    pub name: &'static str,
    /// Ticker symbol (e.g. `"ETH"`).
    pub symbol: &'static str,
    /// Decimal places of the smallest unit.
    pub decimals: u8,
}

/// Resolved configuration record for a supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// The network this record describes.
    pub chain: SupportedChain,
    /// Human-readable network name.
    pub name: &'static str,
    /// Native gas token.
    pub native_currency: NativeCurrency,
    /// Public RPC endpoints, best first.
    pub default_rpc_urls: &'static [&'static str],
    /// Block explorer base URL, if the network has one.
    pub block_explorer: Option<&'static str>,
    /// Whether the canonical Multicall3 contract is deployed, which call
    /// batching relies on.
    pub multicall3: bool,
}

impl ChainConfig {
    /// Convenience: the EIP-155 chain ID.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    /// The preferred default RPC endpoint.
    #[must_use]
    pub fn default_rpc(&self) -> &'static str {
        self.default_rpc_urls.first().copied().unwrap_or_default()
    }
}

const ETHER: NativeCurrency = NativeCurrency {
    name: "Ether",
    symbol: "ETH",
    decimals: 18,
};

const MAINNET: ChainConfig = ChainConfig {
    chain: SupportedChain::Mainnet,
    name: "Ethereum",
    native_currency: ETHER,
    default_rpc_urls: &["https://ethereum-rpc.publicnode.com", "https://eth.merkle.io"],
    block_explorer: Some("https://etherscan.io"),
    multicall3: true,
};

const LOCALHOST: ChainConfig = ChainConfig {
    chain: SupportedChain::Localhost,
    name: "Localhost",
    native_currency: ETHER,
    default_rpc_urls: &["http://127.0.0.1:8545"],
    block_explorer: None,
    multicall3: false,
};

const BASE: ChainConfig = ChainConfig {
    chain: SupportedChain::Base,
    name: "Base",
    native_currency: ETHER,
    default_rpc_urls: &["https://mainnet.base.org"],
    block_explorer: Some("https://basescan.org"),
    multicall3: true,
};

const ARBITRUM: ChainConfig = ChainConfig {
    chain: SupportedChain::Arbitrum,
    name: "Arbitrum One",
    native_currency: ETHER,
    default_rpc_urls: &["https://arb1.arbitrum.io/rpc"],
    block_explorer: Some("https://arbiscan.io"),
    multicall3: true,
};

/// Resolve a chain identifier to its configuration.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChain`] if the identifier is not a supported
/// network.
pub fn resolve(chain_id: impl Into<ChainId>) -> Result<&'static ChainConfig> {
    let chain_id = chain_id.into();
    SupportedChain::from_chain_id(chain_id.get())
        .map(SupportedChain::config)
        .ok_or_else(|| Error::UnsupportedChain(chain_id.to_string()))
}

/// Resolve a chain identifier given as a hex or decimal string.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChain`] if the string does not parse or names
/// an unsupported network.
pub fn resolve_str(chain_id: &str) -> Result<&'static ChainConfig> {
    let parsed: ChainId = chain_id.parse()?;
    resolve(parsed).map_err(|_| Error::UnsupportedChain(chain_id.to_owned()))
}
