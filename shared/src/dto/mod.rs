//! # Data Transfer Objects (DTOs)
//!
//! Structures exchanged with the backend session endpoint or written to the
//! client's durable store.
//!
//! ## Module Organization
//!
//! - [`envelope`] - Session frames and control payloads
//! - [`errors`] - Error categories and recovery actions
//! - [`offline`] - Queued requests awaiting replay
//! - [`wallet`] - Wallet kinds, chains, persisted wallet session
//!
//! ## Serialization Format
//!
//! - **Session frames**: snake_case field names, `type` tag renamed from `message_type`
//! - **Durable records**: camelCase field names (shared with the web client's storage layout)
//! - **Enums**: lowercase / snake_case strings

pub mod envelope;
pub mod errors;
pub mod offline;
pub mod wallet;

pub use envelope::*;
pub use errors::*;
pub use offline::*;
pub use wallet::*;
