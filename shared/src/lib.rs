//! # Shared Wire Types Library
//!
//! This library defines the contract between the realtime client (`fabric`) and
//! the backend session endpoint, plus the records the client persists locally.
//! All types use JSON serialization via `serde`.
//!
//! ## Structure
//!
//! - **[`dto`]**: Data Transfer Objects
//!   - **[`dto::envelope`]**: Session frames (`Envelope`) and control payloads
//!   - **[`dto::errors`]**: Error taxonomy shared by every client component
//!   - **[`dto::offline`]**: Durable queued requests
//!   - **[`dto::wallet`]**: Wallet kinds, chains and the persisted session record
//! - **[`utils`]**: Shared utility functions
//!   - **[`utils::format_address`]**: Shorten wallet addresses for display
//!
//! ## Wire Format
//!
//! Session frames are single JSON objects:
//!
//! ```text
//! {
//!   "id": "6f1c2a0e-8a55-4c89-9a0b-3f5c7c1d9b21",
//!   "type": "subscribe",
//!   "channel": "system",
//!   "data": { "channel": "discovery" },
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "client_id": "c2d7..."
//! }
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use shared::dto::envelope::{Envelope, SYSTEM_CHANNEL};
//! use shared::utils::format_address;
//!
//! let frame = Envelope::subscribe("discovery", "client-1");
//! assert_eq!(frame.channel, SYSTEM_CHANNEL);
//!
//! let short = format_address("0x52908400098527886E0F7030069857D2E4169EE7");
//! assert_eq!(short, "0x5290...9EE7");
//! ```

pub mod dto;
pub mod utils;

// Wildcard re-exports: everything in this crate is public wire contract
pub use dto::*;
pub use utils::*;
