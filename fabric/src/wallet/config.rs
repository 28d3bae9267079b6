use serde::{Deserialize, Serialize};
use shared::dto::Chain;
use std::time::Duration;

/// Shortest restore debounce; a double mount lands well inside it.
pub const MIN_RESTORE_DEBOUNCE_MS: u64 = 100;

/// Wallet session settings. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    /// Restore the persisted session on mount.
    pub auto_connect: bool,
    pub default_chain: Chain,
    pub persist_connection: bool,
    /// Budget for every provider call.
    pub connect_timeout_ms: u64,
    pub max_retry_count: u32,
    pub balance_refresh_ms: u64,
    pub supported_chains: Vec<Chain>,
    pub restore_debounce_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            default_chain: Chain::Ethereum,
            persist_connection: true,
            connect_timeout_ms: 30_000,
            max_retry_count: 3,
            balance_refresh_ms: 30_000,
            supported_chains: Chain::ALL.to_vec(),
            restore_debounce_ms: 150,
        }
    }
}

impl WalletConfig {
    /// Defaults overridden by the environment.
    ///
    /// - `FABRIC_DEFAULT_CHAIN`: chain name or EVM chain id
    /// - `FABRIC_WALLET_AUTO_CONNECT`: `true` / `false`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_chain: lib_utils::get_env_or("FABRIC_DEFAULT_CHAIN", defaults.default_chain),
            auto_connect: lib_utils::get_env_or("FABRIC_WALLET_AUTO_CONNECT", defaults.auto_connect),
            ..defaults
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn balance_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.balance_refresh_ms)
    }

    pub fn restore_debounce(&self) -> Duration {
        Duration::from_millis(self.restore_debounce_ms.max(MIN_RESTORE_DEBOUNCE_MS))
    }

    pub fn supports(&self, chain: Chain) -> bool {
        self.supported_chains.contains(&chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalletConfig::default();
        assert!(config.auto_connect);
        assert_eq!(config.default_chain, Chain::Ethereum);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retry_count, 3);
        assert!(config.supports(Chain::Solana));
    }

    #[test]
    fn test_restore_debounce_has_floor() {
        let config = WalletConfig {
            restore_debounce_ms: 10,
            ..WalletConfig::default()
        };
        assert_eq!(config.restore_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_json() {
        let config: WalletConfig =
            serde_json::from_str(r#"{"defaultChain":"solana","supportedChains":["solana"]}"#)
                .unwrap();
        assert_eq!(config.default_chain, Chain::Solana);
        assert!(!config.supports(Chain::Ethereum));
        assert!(config.persist_connection);
    }
}
