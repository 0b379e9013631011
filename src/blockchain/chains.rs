use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ValidationError;

/// Supported chains, keyed by the short name used in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Eth,
    Avax,
    Base,
    Bnb,
    Arbi,
    Poly,
    Opt,
    Sonic,
    Sol,
}

pub const DEFAULT_CHAIN: Chain = Chain::Eth;

/// Request keys in the order they are advertised by `/api/chains`
pub const SUPPORTED_CHAINS: &[Chain] = &[
    Chain::Eth,
    Chain::Avax,
    Chain::Base,
    Chain::Bnb,
    Chain::Arbi,
    Chain::Poly,
    Chain::Opt,
    Chain::Sonic,
    Chain::Sol,
];

static CHAIN_BY_KEY: Lazy<HashMap<&'static str, Chain>> = Lazy::new(|| {
    SUPPORTED_CHAINS.iter().map(|chain| (chain.key(), *chain)).collect()
});

impl Chain {
    pub fn key(&self) -> &'static str {
        match self {
            Chain::Eth => "eth",
            Chain::Avax => "avax",
            Chain::Base => "base",
            Chain::Bnb => "bnb",
            Chain::Arbi => "arbi",
            Chain::Poly => "poly",
            Chain::Opt => "opt",
            Chain::Sonic => "sonic",
            Chain::Sol => "sol",
        }
    }

    /// Provider network identifier, used to build the per-chain endpoint
    pub fn network_id(&self) -> &'static str {
        match self {
            Chain::Eth => "eth-mainnet",
            Chain::Avax => "avax-mainnet",
            Chain::Base => "base-mainnet",
            Chain::Bnb => "bnb-mainnet",
            Chain::Arbi => "arb-mainnet",
            Chain::Poly => "polygon-mainnet",
            Chain::Opt => "opt-mainnet",
            Chain::Sonic => "sonic-mainnet",
            Chain::Sol => "solana-mainnet",
        }
    }

    pub fn from_key(key: &str) -> Option<Chain> {
        CHAIN_BY_KEY.get(key).copied()
    }

    /// Strict lookup used for request validation
    pub fn parse(key: &str) -> Result<Chain, ValidationError> {
        Self::from_key(key).ok_or_else(|| ValidationError::UnsupportedChain {
            chain: key.to_string(),
            supported: supported_chain_keys(),
        })
    }

    /// Lenient lookup: unknown keys fall back to the default chain
    pub fn resolve_or_default(key: &str) -> Chain {
        Self::from_key(key).unwrap_or_else(|| {
            log::warn!("Unsupported chain: {}, falling back to {}", key, DEFAULT_CHAIN);
            DEFAULT_CHAIN
        })
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub fn supported_chain_keys() -> Vec<String> {
    SUPPORTED_CHAINS.iter().map(|c| c.key().to_string()).collect()
}
