//! External service integrations.
//!
//! - [`BackendClient`]: backend HTTP API, plugged into the wallet session as
//!   its [`BalanceEnricher`](crate::core::service::BalanceEnricher)
//! - [`HttpProbe`](crate::offline::HttpProbe) lives with the offline fabric

pub mod backend;

pub use backend::{parse_ui_amount, BackendClient, TokenBalanceDto};
