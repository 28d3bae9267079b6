//! # Core Abstractions
//!
//! Core traits and error types shared by the connection manager, the offline
//! fabric and the wallet session.
//!
//! ## Modules
//!
//! - **[`error`]**: Internal error enum (`FabricError`, `Result<T>`), the surfaced
//!   [`ErrorRecord`] and the category classifier
//! - **[`service`]**: Traits at the external seams (`Transport`, `HealthProbe`,
//!   `ReplayHandler`, `WalletProvider`, `BalanceEnricher`)
//!
//! ## Error Handling
//!
//! Internal plumbing propagates [`FabricError`] with `?`. Public operations that
//! can fail in front of a user return `Result<T, ErrorRecord>`:
//!
//! ```rust,no_run
//! use fabric::core::error::{ErrorRecord, FabricError};
//!
//! fn check(address: &str) -> Result<(), ErrorRecord> {
//!     if address.is_empty() {
//!         let err = FabricError::Validation("empty address".to_string());
//!         return Err(ErrorRecord::from_error(&err, "wallet.connect"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Dependency Injection
//!
//! Every external effect goes through a trait from [`service`], so tests swap
//! in the scripted doubles from [`crate::testing`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fabric::connection::{ConnectionConfig, ConnectionManager, WsTransport};
//!
//! let manager = ConnectionManager::new(ConnectionConfig::default(), Arc::new(WsTransport));
//! ```

pub mod error;
pub mod service;

pub use error::{categorize, ErrorRecord, FabricError, Result};
pub use service::{
    BalanceEnricher, FrameSink, FrameSource, HealthProbe, ProviderEvent, ReplayHandler,
    Transport, TransportEvent, TransportSession, WalletProvider,
};
