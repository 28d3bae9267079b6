//! # Wallet Session
//!
//! Connection state for EVM and Solana browser wallets behind one
//! [`WalletSessionCore`].
//!
//! ## Providers
//!
//! Each wallet kind is a [`WalletProvider`](crate::core::service::WalletProvider)
//! registered with a [`ProviderRegistry`]. Every provider call runs under the
//! connect timeout budget (`connectTimeoutMs`, default 30s).
//!
//! ## Persistence
//!
//! A successful connect writes `walletSession` to the durable store:
//!
//! ```json
//! {"walletAddress":"0x5290...9ee7","walletType":"metamask","selectedChain":"base","timestamp":1767225600000,"version":1}
//! ```
//!
//! On mount the record is restored only if it is at most seven days old and the
//! provider still lists the address among its authorized accounts. Restores
//! never prompt the user.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fabric::store;
//! use fabric::wallet::{ProviderRegistry, WalletConfig, WalletSessionCore};
//! use shared::dto::{Chain, WalletType};
//!
//! # async fn run() {
//! let registry = ProviderRegistry::new();
//! let wallet = WalletSessionCore::new(WalletConfig::from_env(), registry, store::default_store());
//! wallet.mount();
//!
//! match wallet.connect(WalletType::Metamask, Some(Chain::Base)).await {
//!     Ok(address) => tracing::info!(%address, "connected"),
//!     Err(record) => tracing::warn!(code = record.code(), "{}", record.user_message),
//! }
//! # }
//! ```

mod address;
mod config;
mod persistence;
mod registry;
mod session;
mod state;

pub use address::{addresses_match, is_valid_address, validate_address};
pub use config::{WalletConfig, MIN_RESTORE_DEBOUNCE_MS};
pub use persistence::{SavedSession, SessionPersistence, WALLET_SESSION_KEY};
pub use registry::{DetectedWallet, ProviderRegistry};
pub use session::{ConnectOutcome, WalletSessionCore};
pub use state::{
    Balance, Balances, NetworkStatus, TokenBalance, WalletEvent, WalletSession, WalletStatus,
    ERROR_HISTORY_LIMIT,
};
