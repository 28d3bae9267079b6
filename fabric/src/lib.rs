//! # Fabric - Client-Side Realtime Fabric
//!
//! The client half of a trading application's realtime plumbing: one
//! multiplexed session to the backend, an offline-tolerant request queue and a
//! wallet session for EVM and Solana browser wallets.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   application / UI layer                   │
//! └──────┬───────────────────────┬──────────────────────┬──────┘
//!        │ subscribe / send      │ queue_request        │ connect / switch_chain
//!        ▼                       ▼                      ▼
//! ┌──────────────┐      ┌─────────────────┐    ┌───────────────────┐
//! │ connection   │      │ offline         │◀───│ wallet            │
//! │ Manager      │      │ OfflineFabric   │    │ WalletSessionCore │
//! └──────┬───────┘      └───┬─────────┬───┘    └───┬──────────┬────┘
//!        │ WebSocket        │ HEAD    │ store      │ providers│ store
//!        ▼                  ▼         ▼            ▼          ▼
//!     backend /api/ws   /api/health  offlineQueue  wallets   walletSession
//! ```
//!
//! ## Modules
//!
//! - **core**: `FabricError`, `ErrorRecord` and the traits at external seams
//! - **debug**: structured logging, correlation ids, error ring buffers
//! - **events**: callback fan-out with cancel handles
//! - **utils**: clock, backoff, debouncer
//! - **store**: durable JSON key/value store (memory and file backed)
//! - **connection**: multiplexed WebSocket session with reconnects
//! - **offline**: connectivity monitor and replay queue
//! - **wallet**: wallet session state machine, persistence and balances
//! - **services**: backend HTTP client
//! - **testing**: scripted doubles for transports, probes and providers (`testing` feature)
//!
//! ## Threading
//!
//! Every component is a cheap `Clone` handle over shared state. Locks are
//! `parking_lot` and never held across an `.await`; events are emitted after
//! the lock is released, so callbacks may call back into the component.

pub mod connection;
pub mod core;
pub mod debug;
pub mod events;
pub mod offline;
pub mod services;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;
pub mod wallet;

pub use crate::core::error::{ErrorRecord, FabricError, Result};
