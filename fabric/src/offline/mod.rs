//! # Offline Fabric
//!
//! Connectivity monitoring and a durable replay queue.
//!
//! ## Connectivity
//!
//! Each probe round sends `HEAD` requests to the configured health URLs in
//! order; the first success decides online, a fully failed round decides
//! offline. The last ten rounds are kept and the last five classified:
//!
//! | Condition                                   | Quality   |
//! |---------------------------------------------|-----------|
//! | no rounds yet                               | `unknown` |
//! | success rate < 0.5                          | `poor`    |
//! | success rate < 0.8 or latency > slow limit  | `slow`    |
//! | latency < fast limit                        | `fast`    |
//! | otherwise                                   | `good`    |
//!
//! ## Queue
//!
//! Requests are stored under `offlineQueue` as a JSON array and replayed on
//! every offline to online transition, or on demand with
//! [`OfflineFabric::retry_queue`].
//!
//! ```rust,no_run
//! use fabric::offline;
//!
//! # async fn run() {
//! let fabric = offline::global();
//! fabric.register_fn("trade", |request| async move {
//!     tracing::info!(data = %request.data, "replaying trade");
//!     Ok(())
//! });
//! fabric.queue_request("trade", serde_json::json!({"id": "T1"}));
//! fabric.start();
//! # }
//! ```

mod config;
mod fabric;
mod network;
mod probe;
mod queue;

pub use config::OfflineConfig;
pub use fabric::{OfflineEvent, OfflineFabric, QueueSummary};
pub use network::{
    classify, ConnectionQuality, NetworkMonitor, NetworkState, ProbeSample, CLASSIFY_WINDOW,
    SAMPLE_HISTORY,
};
pub use probe::HttpProbe;
pub use queue::{stored_items, RequestQueue};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static GLOBAL: Lazy<Mutex<Option<OfflineFabric>>> = Lazy::new(|| Mutex::new(None));

/// Process-wide fabric, created on first use from [`OfflineFabric::from_env`].
/// Polling is not started automatically.
pub fn global() -> OfflineFabric {
    GLOBAL.lock().get_or_insert_with(OfflineFabric::from_env).clone()
}

/// Replace the process-wide fabric, stopping the previous one's polling.
pub fn install_global(fabric: OfflineFabric) {
    let previous = GLOBAL.lock().replace(fabric);
    if let Some(previous) = previous {
        previous.stop();
    }
}

/// Stop polling and forget the process-wide fabric. The durable queue is kept.
pub fn teardown_global() {
    let previous = GLOBAL.lock().take();
    if let Some(fabric) = previous {
        fabric.stop();
    }
}
