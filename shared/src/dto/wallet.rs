//! # Wallet Types
//!
//! Wallet kinds, supported chains and the persisted wallet session record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current layout version of [`PersistedWalletSession`].
pub const PERSISTED_SESSION_VERSION: u32 = 1;

/// Persisted sessions older than this are discarded (7 days).
pub const SESSION_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Address/signing protocol of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => f.write_str("evm"),
            ChainFamily::Solana => f.write_str("solana"),
        }
    }
}

/// Supported chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Arbitrum,
    Base,
    Bsc,
    Solana,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Bsc,
        Chain::Solana,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Solana => "solana",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    /// EIP-155 chain id, for EVM chains.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Polygon => Some(137),
            Chain::Arbitrum => Some(42161),
            Chain::Base => Some(8453),
            Chain::Bsc => Some(56),
            Chain::Solana => None,
        }
    }

    pub fn from_evm_chain_id(id: u64) -> Option<Chain> {
        Chain::ALL
            .into_iter()
            .find(|chain| chain.evm_chain_id() == Some(id))
    }

    /// Decimals of the native currency's smallest unit (wei, lamports).
    pub fn native_decimals(&self) -> u8 {
        match self.family() {
            ChainFamily::Evm => 18,
            ChainFamily::Solana => 9,
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Base => "ETH",
            Chain::Polygon => "POL",
            Chain::Bsc => "BNB",
            Chain::Solana => "SOL",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    /// Accepts chain names and EVM chain ids in decimal or `0x` hex form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(chain) = Chain::ALL
            .into_iter()
            .find(|chain| chain.as_str().eq_ignore_ascii_case(trimmed))
        {
            return Ok(chain);
        }
        let id = match trimmed.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => trimmed.parse::<u64>().ok(),
        };
        id.and_then(Chain::from_evm_chain_id)
            .ok_or_else(|| format!("Unsupported chain: {}", s))
    }
}

/// Supported wallet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Metamask,
    Coinbase,
    WalletConnect,
    Phantom,
    Solflare,
    Backpack,
}

impl WalletType {
    pub fn name(&self) -> &'static str {
        match self {
            WalletType::Metamask => "MetaMask",
            WalletType::Coinbase => "Coinbase Wallet",
            WalletType::WalletConnect => "WalletConnect",
            WalletType::Phantom => "Phantom",
            WalletType::Solflare => "Solflare",
            WalletType::Backpack => "Backpack",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            WalletType::Metamask | WalletType::Coinbase | WalletType::WalletConnect => {
                ChainFamily::Evm
            }
            WalletType::Phantom | WalletType::Solflare | WalletType::Backpack => {
                ChainFamily::Solana
            }
        }
    }

    pub fn supports(&self, chain: Chain) -> bool {
        self.family() == chain.family()
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wallet session as written to the `walletSession` store key.
///
/// Every field is optional on read so that partially written or foreign
/// records can be detected and discarded instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWalletSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_type: Option<WalletType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_chain: Option<Chain>,
    /// Milliseconds since the Unix epoch when the session was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl PersistedWalletSession {
    pub fn new(address: &str, wallet_type: WalletType, chain: Chain, timestamp: i64) -> Self {
        Self {
            wallet_address: Some(address.to_string()),
            wallet_type: Some(wallet_type),
            selected_chain: Some(chain),
            timestamp: Some(timestamp),
            version: Some(PERSISTED_SESSION_VERSION),
        }
    }

    /// True once `now_ms` is more than [`SESSION_TTL_MS`] past `timestamp`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.timestamp {
            Some(ts) => now_ms - ts > SESSION_TTL_MS,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_parsing() {
        assert_eq!("ethereum".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert_eq!("Solana".parse::<Chain>().unwrap(), Chain::Solana);
        assert_eq!("0x89".parse::<Chain>().unwrap(), Chain::Polygon);
        assert_eq!("8453".parse::<Chain>().unwrap(), Chain::Base);
        assert!("0xdeadbeef".parse::<Chain>().is_err());
    }

    #[test]
    fn test_wallet_families() {
        assert!(WalletType::Metamask.supports(Chain::Polygon));
        assert!(!WalletType::Metamask.supports(Chain::Solana));
        assert!(WalletType::Phantom.supports(Chain::Solana));
    }

    #[test]
    fn test_persisted_layout() {
        let record = PersistedWalletSession::new(
            "0x52908400098527886E0F7030069857D2E4169EE7",
            WalletType::Metamask,
            Chain::Ethereum,
            1_000,
        );
        let raw = serde_json::to_value(&record).unwrap();
        assert_eq!(raw["walletType"], "metamask");
        assert_eq!(raw["selectedChain"], "ethereum");
        assert_eq!(raw["version"], PERSISTED_SESSION_VERSION);
    }

    #[test]
    fn test_expiry_boundary() {
        let record = PersistedWalletSession::new("a", WalletType::Phantom, Chain::Solana, 0);
        assert!(!record.is_expired(SESSION_TTL_MS));
        assert!(record.is_expired(SESSION_TTL_MS + 1));
        assert!(PersistedWalletSession::default().is_expired(0));
    }
}
