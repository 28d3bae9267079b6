//! # Service Traits
//!
//! Traits at every external seam, enabling dependency injection and scripted
//! doubles in tests (see [`crate::testing`]).

use crate::core::error::{FabricError, Result};
use crate::events::Listener;
use crate::wallet::TokenBalance;
use async_trait::async_trait;
use shared::dto::{Chain, QueuedRequest, WalletType};
use std::sync::Arc;
use std::time::Duration;

/// Normal closure close code.
pub const CLOSE_NORMAL: u16 = 1000;
/// Closure without a close frame (stream error, reset, EOF).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Something that happened on the receiving half of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame.
    Frame(String),
    /// The transport is gone. No further events follow.
    Closed { code: u16, reason: String },
}

/// Sending half of an open transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<()>;

    async fn close(&mut self, code: u16) -> Result<()>;
}

/// Receiving half of an open transport.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next event. After `Closed` the source must not be polled again.
    async fn next_event(&mut self) -> TransportEvent;
}

/// Both halves of one open transport.
pub struct TransportSession {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens bidirectional text-frame transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<TransportSession>;
}

/// Reachability check against one health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe `url`, returning the observed latency. Must give up after `timeout`.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration>;
}

/// Replays one kind of queued request once connectivity is back.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    async fn replay(&self, request: &QueuedRequest) -> Result<()>;
}

/// Notifications a wallet provider pushes to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    /// Chain identifier as reported by the provider (name or EVM chain id).
    ChainChanged(String),
    Disconnected,
}

/// Listener callback registered with a provider.
pub type ProviderListener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// A browser wallet extension (or anything that behaves like one).
///
/// Signing operations are optional; providers that cannot sign keep the
/// default implementations, which fail with [`FabricError::Unsupported`].
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn wallet_type(&self) -> WalletType;

    fn is_installed(&self) -> bool {
        true
    }

    /// Request account access on `chain`, returning the selected address.
    async fn connect(&self, chain: Chain) -> Result<String>;

    async fn disconnect(&self) -> Result<()>;

    /// Accounts the provider is currently authorized for, without prompting.
    async fn connected_accounts(&self) -> Result<Vec<String>>;

    async fn switch_chain(&self, chain: Chain) -> Result<()>;

    /// Native balance of `address` in the chain's smallest unit.
    async fn native_balance(&self, address: &str, chain: Chain) -> Result<u128>;

    async fn sign_message(&self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(FabricError::Unsupported("sign_message"))
    }

    async fn sign_transaction(&self, _transaction: &[u8]) -> Result<Vec<u8>> {
        Err(FabricError::Unsupported("sign_transaction"))
    }

    async fn sign_and_send_transaction(&self, _transaction: &[u8]) -> Result<String> {
        Err(FabricError::Unsupported("sign_and_send_transaction"))
    }

    /// Register a listener for account/chain/disconnect notifications.
    fn subscribe(&self, listener: ProviderListener) -> Listener;
}

/// Supplies token balances beyond the native currency.
#[async_trait]
pub trait BalanceEnricher: Send + Sync {
    async fn token_balances(&self, address: &str, chain: Chain) -> Result<Vec<TokenBalance>>;
}
