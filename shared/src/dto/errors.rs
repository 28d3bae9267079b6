//! # Error Taxonomy
//!
//! Categories and recovery actions surfaced identically by the connection
//! manager, the offline fabric and the wallet session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failure as seen by the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UserRejected,
    WalletNotInstalled,
    Timeout,
    NetworkError,
    InsufficientBalance,
    RpcError,
    WalletNotConnected,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserRejected => "user_rejected",
            ErrorCategory::WalletNotInstalled => "wallet_not_installed",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::InsufficientBalance => "insufficient_balance",
            ErrorCategory::RpcError => "rpc_error",
            ErrorCategory::WalletNotConnected => "wallet_not_connected",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Recovery the UI should offer for this category.
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            ErrorCategory::UserRejected => RecoveryAction::RetryConnection,
            ErrorCategory::WalletNotInstalled => RecoveryAction::InstallWallet,
            ErrorCategory::Timeout => RecoveryAction::RetryConnection,
            ErrorCategory::NetworkError => RecoveryAction::CheckNetwork,
            ErrorCategory::InsufficientBalance => RecoveryAction::AddFunds,
            ErrorCategory::RpcError => RecoveryAction::SwitchNetwork,
            ErrorCategory::WalletNotConnected => RecoveryAction::ConnectWallet,
            ErrorCategory::Unknown => RecoveryAction::ContactSupport,
        }
    }

    /// Short message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::UserRejected => "The request was rejected in the wallet.",
            ErrorCategory::WalletNotInstalled => "The selected wallet is not installed.",
            ErrorCategory::Timeout => "The wallet did not respond in time.",
            ErrorCategory::NetworkError => "Network connection problem.",
            ErrorCategory::InsufficientBalance => "Insufficient balance for this operation.",
            ErrorCategory::RpcError => "The network node returned an error.",
            ErrorCategory::WalletNotConnected => "Connect a wallet first.",
            ErrorCategory::Unknown => "An unexpected error occurred.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended follow-up for a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RetryConnection,
    InstallWallet,
    CheckNetwork,
    SwitchNetwork,
    AddFunds,
    ConnectWallet,
    ContactSupport,
    None,
}
