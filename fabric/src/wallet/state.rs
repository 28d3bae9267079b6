use crate::core::error::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use shared::dto::{Chain, ErrorCategory, WalletType};
use std::collections::VecDeque;
use std::fmt;

/// Error records kept on a session.
pub const ERROR_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "category")]
pub enum WalletStatus {
    Idle,
    Connecting,
    Connected,
    Error(ErrorCategory),
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Idle => "idle",
            WalletStatus::Connecting => "connecting",
            WalletStatus::Connected => "connected",
            WalletStatus::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WalletStatus::Error(_))
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletStatus::Error(category) => write!(f, "error({})", category.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Connectivity as seen by the wallet session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    #[default]
    Online,
    Slow,
    Offline,
}

fn serialize_raw<S: Serializer>(raw: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&raw.to_string())
}

fn to_ui_amount(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Native balance in the chain's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub chain: Chain,
    #[serde(serialize_with = "serialize_raw")]
    pub raw: u128,
    pub decimals: u8,
}

impl Balance {
    pub fn native(chain: Chain, raw: u128) -> Self {
        Self {
            chain,
            raw,
            decimals: chain.native_decimals(),
        }
    }

    pub fn ui_amount(&self) -> f64 {
        to_ui_amount(self.raw, self.decimals)
    }

    pub fn symbol(&self) -> &'static str {
        self.chain.native_symbol()
    }
}

/// Token balance from enrichment, in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    /// Token mint (Solana) or contract address (EVM).
    pub mint: String,
    pub symbol: Option<String>,
    #[serde(serialize_with = "serialize_raw")]
    pub raw: u128,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn ui_amount(&self) -> f64 {
        to_ui_amount(self.raw, self.decimals)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub native: Option<Balance>,
    pub tokens: Vec<TokenBalance>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// In-memory view of the active wallet connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub address: Option<String>,
    pub wallet_type: Option<WalletType>,
    pub chain: Chain,
    pub status: WalletStatus,
    pub network_status: NetworkStatus,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    /// Oldest first, at most [`ERROR_HISTORY_LIMIT`].
    pub error_history: VecDeque<ErrorRecord>,
    pub balances: Balances,
}

impl WalletSession {
    pub fn new(chain: Chain) -> Self {
        Self {
            address: None,
            wallet_type: None,
            chain,
            status: WalletStatus::Idle,
            network_status: NetworkStatus::Online,
            last_attempt_at: None,
            retry_count: 0,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_LIMIT),
            balances: Balances::default(),
        }
    }

    pub fn push_error(&mut self, record: ErrorRecord) {
        if self.error_history.len() == ERROR_HISTORY_LIMIT {
            self.error_history.pop_front();
        }
        self.error_history.push_back(record);
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.error_history.back()
    }

    /// Forget the connection but keep chain, network status and error history.
    pub fn clear_connection(&mut self) {
        self.address = None;
        self.wallet_type = None;
        self.balances = Balances::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    StatusChanged {
        status: WalletStatus,
        previous: WalletStatus,
    },
    Connected {
        address: String,
        wallet_type: WalletType,
        chain: Chain,
    },
    /// A persisted session was confirmed by its provider.
    Restored {
        address: String,
        wallet_type: WalletType,
        chain: Chain,
    },
    Disconnected,
    AccountChanged {
        address: String,
    },
    ChainChanged {
        chain: Chain,
        previous: Chain,
    },
    BalancesUpdated(Balances),
    NetworkChanged(NetworkStatus),
    Error(ErrorRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_history_is_bounded() {
        let mut session = WalletSession::new(Chain::Ethereum);
        for n in 0..7 {
            session.push_error(ErrorRecord::new(ErrorCategory::Timeout, "wallet.connect", n));
        }
        assert_eq!(session.error_history.len(), ERROR_HISTORY_LIMIT);
        assert_eq!(session.error_history[0].original_error, "2");
        assert_eq!(session.last_error().unwrap().original_error, "6");
    }

    #[test]
    fn test_ui_amount_conversion() {
        let eth = Balance::native(Chain::Ethereum, 1_500_000_000_000_000_000);
        assert_eq!(eth.ui_amount(), 1.5);
        assert_eq!(eth.symbol(), "ETH");
        let sol = Balance::native(Chain::Solana, 2_000_000_000);
        assert_eq!(sol.ui_amount(), 2.0);
    }

    #[test]
    fn test_raw_amounts_serialize_as_strings() {
        let balance = Balance::native(Chain::Ethereum, u128::MAX);
        let raw = serde_json::to_value(balance).unwrap();
        assert_eq!(raw["raw"], u128::MAX.to_string());
        assert_eq!(raw["decimals"], 18);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(WalletStatus::Connected.to_string(), "connected");
        assert_eq!(
            WalletStatus::Error(ErrorCategory::UserRejected).to_string(),
            "error(user_rejected)"
        );
    }
}
