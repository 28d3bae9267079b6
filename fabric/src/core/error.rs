//! # Error Types
//!
//! [`FabricError`] is the internal error every component propagates with `?`.
//! Whenever an error leaves a component towards a user it is turned into an
//! [`ErrorRecord`]: a classified, correlated, displayable value that carries a
//! [`RecoveryAction`].
//!
//! ## Classification
//!
//! [`categorize`] maps an internal error to an [`ErrorCategory`]. Typed variants
//! are mapped directly. Provider errors are classified by their EIP-1193 / JSON-RPC
//! code first, then by message patterns.
//!
//! | Signal                                        | Category               |
//! |-----------------------------------------------|------------------------|
//! | code `4001`, "user rejected", "user denied"   | `user_rejected`        |
//! | `NotInstalled`, "not installed"               | `wallet_not_installed` |
//! | `Timeout`, "timed out", "timeout"             | `timeout`              |
//! | `NotConnected`, code `4100`                   | `wallet_not_connected` |
//! | "insufficient funds", "insufficient balance"  | `insufficient_balance` |
//! | code `-32000..=-32768`, `4900`/`4901`, "rpc"  | `rpc_error`            |
//! | `Transport`, `Http`, `Probe`, "network"       | `network_error`        |
//! | anything else                                 | `unknown`              |

use crate::debug::trace_context;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shared::dto::{ErrorCategory, RecoveryAction};
use thiserror::Error;

/// Internal error type shared by every component.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Provider error ({code:?}): {message}")]
    Provider { code: Option<i64>, message: String },

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Wallet not installed: {0}")]
    NotInstalled(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

impl FabricError {
    pub fn provider(code: Option<i64>, message: impl Into<String>) -> Self {
        FabricError::Provider {
            code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FabricError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FabricError::Http(format!("request timed out: {}", err));
        }
        FabricError::Http(err.to_string())
    }
}

/// Result type for internal operations.
pub type Result<T> = std::result::Result<T, FabricError>;

const USER_REJECTED_CODE: i64 = 4001;
const UNAUTHORIZED_CODE: i64 = 4100;
const CHAIN_DISCONNECTED_CODES: [i64; 2] = [4900, 4901];

/// Classify an internal error for the user interface.
pub fn categorize(err: &FabricError) -> ErrorCategory {
    match err {
        FabricError::NotInstalled(_) => ErrorCategory::WalletNotInstalled,
        FabricError::Timeout(_) => ErrorCategory::Timeout,
        FabricError::NotConnected(_) => ErrorCategory::WalletNotConnected,
        FabricError::Provider { code, message } => categorize_provider(*code, message),
        FabricError::Transport(msg) | FabricError::Http(msg) | FabricError::Probe(msg) => {
            categorize_message(msg).unwrap_or(ErrorCategory::NetworkError)
        }
        FabricError::Handler(msg) | FabricError::Validation(msg) => {
            categorize_message(msg).unwrap_or(ErrorCategory::Unknown)
        }
        FabricError::Store(_) | FabricError::Serialization(_) | FabricError::Unsupported(_) => {
            ErrorCategory::Unknown
        }
    }
}

fn categorize_provider(code: Option<i64>, message: &str) -> ErrorCategory {
    match code {
        Some(USER_REJECTED_CODE) => return ErrorCategory::UserRejected,
        Some(UNAUTHORIZED_CODE) => return ErrorCategory::WalletNotConnected,
        Some(c) if CHAIN_DISCONNECTED_CODES.contains(&c) => return ErrorCategory::RpcError,
        _ => {}
    }
    if let Some(category) = categorize_message(message) {
        return category;
    }
    match code {
        Some(c) if (-32768..=-32000).contains(&c) => ErrorCategory::RpcError,
        _ => ErrorCategory::Unknown,
    }
}

fn categorize_message(message: &str) -> Option<ErrorCategory> {
    let msg = message.to_lowercase();
    let has = |needle: &str| msg.contains(needle);

    if has("user rejected") || has("user denied") || has("rejected the request") {
        Some(ErrorCategory::UserRejected)
    } else if has("not installed") || has("no provider") {
        Some(ErrorCategory::WalletNotInstalled)
    } else if has("timed out") || has("timeout") {
        Some(ErrorCategory::Timeout)
    } else if has("insufficient funds") || has("insufficient balance") {
        Some(ErrorCategory::InsufficientBalance)
    } else if has("not connected") {
        Some(ErrorCategory::WalletNotConnected)
    } else if has("rpc") || has("json-rpc") {
        Some(ErrorCategory::RpcError)
    } else if has("network") || has("failed to fetch") || has("connection refused") {
        Some(ErrorCategory::NetworkError)
    } else {
        None
    }
}

/// A classified error as surfaced to callers and observers.
///
/// `id` is the correlation id of the task that produced the error, so a record
/// can be matched with the log lines of the same operation.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{category}: {original_error}")]
pub struct ErrorRecord {
    pub id: String,
    pub category: ErrorCategory,
    pub user_message: String,
    pub original_error: String,
    pub recovery_action: RecoveryAction,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub context: Value,
}

impl ErrorRecord {
    pub fn new(
        category: ErrorCategory,
        operation: impl Into<String>,
        original_error: impl std::fmt::Display,
    ) -> Self {
        Self {
            id: trace_context::current_or_new(),
            category,
            user_message: category.user_message().to_string(),
            original_error: original_error.to_string(),
            recovery_action: category.recovery_action(),
            timestamp: Utc::now(),
            operation: operation.into(),
            context: Value::Null,
        }
    }

    pub fn from_error(err: &FabricError, operation: impl Into<String>) -> Self {
        Self::new(categorize(err), operation, err)
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_recovery(mut self, action: RecoveryAction) -> Self {
        self.recovery_action = action;
        self
    }

    /// Stable machine-readable code, the category's wire name.
    pub fn code(&self) -> &'static str {
        self.category.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = FabricError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
        assert_eq!(FabricError::Timeout(5000).to_string(), "Timed out after 5000ms");
    }

    #[test]
    fn test_categorize_typed_variants() {
        assert_eq!(
            categorize(&FabricError::NotInstalled("phantom".into())),
            ErrorCategory::WalletNotInstalled
        );
        assert_eq!(categorize(&FabricError::Timeout(1)), ErrorCategory::Timeout);
        assert_eq!(
            categorize(&FabricError::Transport("reset".into())),
            ErrorCategory::NetworkError
        );
        assert_eq!(
            categorize(&FabricError::NotConnected("wallet".into())),
            ErrorCategory::WalletNotConnected
        );
    }

    #[test]
    fn test_categorize_provider_codes() {
        assert_eq!(
            categorize(&FabricError::provider(Some(4001), "whatever")),
            ErrorCategory::UserRejected
        );
        assert_eq!(
            categorize(&FabricError::provider(Some(-32603), "internal")),
            ErrorCategory::RpcError
        );
        assert_eq!(
            categorize(&FabricError::provider(None, "User denied transaction signature")),
            ErrorCategory::UserRejected
        );
        assert_eq!(
            categorize(&FabricError::provider(None, "insufficient funds for gas")),
            ErrorCategory::InsufficientBalance
        );
        assert_eq!(
            categorize(&FabricError::provider(None, "something odd")),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn test_record_carries_recovery_and_context() {
        let err = FabricError::NotInstalled("phantom".into());
        let record = ErrorRecord::from_error(&err, "wallet.connect")
            .with_context(json!({"walletType": "phantom"}));

        assert_eq!(record.code(), "wallet_not_installed");
        assert_eq!(record.recovery_action, RecoveryAction::InstallWallet);
        assert_eq!(record.operation, "wallet.connect");
        assert_eq!(record.context["walletType"], "phantom");
        assert!(!record.id.is_empty());
    }

    #[tokio::test]
    async fn test_record_uses_ambient_correlation_id() {
        let record = trace_context::with_trace_id("corr-42".to_string(), async {
            ErrorRecord::new(ErrorCategory::Timeout, "probe", "timed out")
        })
        .await;
        assert_eq!(record.id, "corr-42");
    }
}
