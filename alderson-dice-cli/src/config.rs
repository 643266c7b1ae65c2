//! Runtime configuration loaded from `alderson.toml`.
//!
//! Contract addresses change with every redeployment, so they live here
//! rather than in the binary. A deployment is keyed by chain ID:
//!
//! ```toml
//! [deployments.42161]
//! rpc = "https://arb1.arbitrum.io/rpc"
//! game = { address = "0x5FbDB2315678afecb367f032d93F642f64180aa3", abi = "abi/AldersonDiceGameV0.json" }
//! nft = { address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512", abi = "abi/AldersonDiceNFT.json" }
//!
//! [deployments.1337]
//! multicall = false
//! ```
//!
//! When no config file is present the built-in chain defaults are used and
//! contract commands fail with a hint to add a deployment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alderson_dice::{Address, ClientOptions, ContractAbi, ContractKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Per-chain deployments, keyed by chain ID.
    #[serde(default)]
    pub deployments: HashMap<u64, Deployment>,

    /// Directory relative ABI paths are resolved against. Set to the config
    /// file's directory by [`Config::load`].
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Settings for one chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deployment {
    /// HTTP endpoint replacing the chain's default public RPC.
    pub rpc: Option<Url>,
    /// Batch `eth_call`s through Multicall3 where the chain has it.
    pub multicall: Option<bool>,
    /// The game contract.
    pub game: Option<ContractEntry>,
    /// The dice NFT contract.
    pub nft: Option<ContractEntry>,
}

/// Address and ABI artifact of one deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContractEntry {
    /// Deployed address.
    pub address: Address,
    /// Path to the ABI artifact (compiler output or bare ABI array).
    pub abi: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns [`Config::default`] if the file does not exist,
    /// allowing the binary to work without any config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Client options for a chain: the deployment's RPC override and
    /// multicall flag, if any.
    #[must_use]
    pub fn client_options(&self, chain_id: u64) -> ClientOptions {
        let mut options = ClientOptions::default();
        if let Some(deployment) = self.deployments.get(&chain_id) {
            if let Some(rpc) = &deployment.rpc {
                options = options.with_fallback_url(rpc.clone());
            }
            if let Some(multicall) = deployment.multicall {
                options = options.with_multicall(multicall);
            }
        }
        options
    }

    /// The configured address and ABI path of `kind` on a chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain has no deployment of that contract.
    pub fn contract(&self, chain_id: u64, kind: ContractKind) -> Result<&ContractEntry> {
        let deployment = self
            .deployments
            .get(&chain_id)
            .with_context(|| format!("no deployment configured for chain {chain_id}"))?;
        let entry = match kind {
            ContractKind::Game => deployment.game.as_ref(),
            ContractKind::Nft => deployment.nft.as_ref(),
        };
        entry.with_context(|| {
            format!(
                "chain {chain_id} has no `{kind}` contract; add [deployments.{chain_id}.{kind}]"
            )
        })
    }

    /// Read and parse the ABI artifact of `entry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or is not an ABI.
    pub fn load_abi(&self, entry: &ContractEntry) -> Result<ContractAbi> {
        let path = self.base_dir.join(&entry.abi);
        let json =
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        ContractAbi::from_json(&json).with_context(|| format!("parsing {}", path.display()))
    }
}
