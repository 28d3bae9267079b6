//! # Connection Manager
//!
//! A single long-lived bidirectional session to the backend, multiplexed
//! across logical channels.
//!
//! ## Wire format
//!
//! Every frame is one JSON [`Envelope`](shared::dto::Envelope). Control
//! envelopes travel on the reserved `"system"` channel:
//!
//! ```text
//! -> {"type":"subscribe","channel":"system","data":{"channel":"prices"}}
//! <- {"type":"subscription_ack","data":{"subscribed_channel":"prices"}}
//! <- {"type":"heartbeat","channel":"system","data":{"ping":true}}
//! -> {"type":"heartbeat","channel":"system","data":{"pong":true}}
//! ```
//!
//! State changes are published locally as `connection_state` envelopes on the
//! `"connection"` pseudo-channel and through [`ConnectionManager::watch_state`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fabric::connection;
//!
//! # async fn run() {
//! let manager = connection::global();
//! let prices = manager.subscribe("prices", |envelope| {
//!     tracing::info!(data = %envelope.data, "price update");
//! });
//! manager.send("order", "orders", serde_json::json!({"side": "buy"}));
//! prices.cancel();
//! connection::teardown_global();
//! # }
//! ```

mod config;
mod manager;
mod outbound;
mod state;
mod subscriptions;
mod transport;

pub use config::ConnectionConfig;
pub use manager::{ConnectionManager, Subscription};
pub use outbound::OutboundQueue;
pub use state::ConnectionState;
pub use subscriptions::{MessageHandler, SubscriptionRegistry};
pub use transport::WsTransport;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

static GLOBAL: Lazy<Mutex<Option<ConnectionManager>>> = Lazy::new(|| Mutex::new(None));

/// Process-wide manager, created on first use from [`ConnectionConfig::from_env`].
pub fn global() -> ConnectionManager {
    GLOBAL
        .lock()
        .get_or_insert_with(|| {
            ConnectionManager::new(ConnectionConfig::from_env(), Arc::new(WsTransport))
        })
        .clone()
}

/// Replace the process-wide manager, disconnecting the previous one.
pub fn install_global(manager: ConnectionManager) {
    let previous = GLOBAL.lock().replace(manager);
    if let Some(previous) = previous {
        previous.disconnect();
    }
}

/// Disconnect and forget the process-wide manager. The next [`global`]
/// call builds a fresh one.
pub fn teardown_global() {
    let previous = GLOBAL.lock().take();
    if let Some(manager) = previous {
        manager.disconnect();
    }
}
