//! `fabric-monitor`: connect to the backend session, subscribe to channels
//! and log every envelope and connectivity change until Ctrl-C.
//!
//! Environment:
//! - `FABRIC_CHANNELS`: comma-separated channels (default `prices`)
//! - `FABRIC_WS_URL` / `API_BASE_URL`: session endpoint
//! - `FABRIC_HEALTH_URLS`: health endpoints for the connectivity monitor

use fabric::connection::{self, Subscription};
use fabric::debug::{self, LogConfig};
use fabric::offline::{self, OfflineEvent};

const DEFAULT_CHANNELS: &str = "prices";

#[tokio::main]
async fn main() {
    let _guard = debug::init(&LogConfig::from_env());

    let channels = lib_utils::get_env_list("FABRIC_CHANNELS")
        .ok()
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CHANNELS.to_string()]);

    let manager = connection::global();
    tracing::info!(
        url = %manager.config().url,
        client_id = %manager.client_id(),
        channels = ?channels,
        "Starting fabric monitor"
    );

    let subscriptions: Vec<Subscription> = channels
        .iter()
        .map(|channel| {
            manager.subscribe(channel, |envelope| {
                let age_ms = lib_utils::parse_utc(&envelope.timestamp)
                    .ok()
                    .map(|sent| (lib_utils::now_utc() - sent).num_milliseconds());
                tracing::info!(
                    channel = %envelope.channel,
                    message_type = %envelope.message_type,
                    age_ms = ?age_ms,
                    data = %envelope.data,
                    "Envelope received"
                );
            })
        })
        .collect();

    let network = offline::global();
    let network_listener = network.subscribe(log_network_event);
    network.start();

    let mut state = manager.watch_state();
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                tracing::info!(state = %current, "Connection state changed");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    for subscription in subscriptions {
        subscription.cancel();
    }
    network_listener.cancel();
    offline::teardown_global();
    connection::teardown_global();
}

fn log_network_event(event: &OfflineEvent) {
    match event {
        OfflineEvent::Online(state) => {
            tracing::info!(quality = %state.connection_quality, "Network online")
        }
        OfflineEvent::Offline(_) => tracing::warn!("Network offline"),
        OfflineEvent::ConnectionChange { current, previous } => tracing::info!(
            quality = %current,
            previous = %previous,
            "Connection quality changed"
        ),
        OfflineEvent::QueueProcessed(summary) => tracing::info!(
            successful = summary.successful,
            failed = summary.failed,
            remaining = summary.remaining,
            "Offline queue processed"
        ),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric::offline::{ConnectionQuality, NetworkState, QueueSummary};

    #[test]
    fn test_every_network_event_is_loggable() {
        let state = NetworkState::default();
        let events = [
            OfflineEvent::Online(state.clone()),
            OfflineEvent::Offline(state.clone()),
            OfflineEvent::ConnectionChange {
                current: ConnectionQuality::Slow,
                previous: ConnectionQuality::Good,
            },
            OfflineEvent::SlowConnection(state.clone()),
            OfflineEvent::FastConnection(state),
            OfflineEvent::QueueProcessed(QueueSummary {
                successful: 1,
                failed: 0,
                remaining: 0,
            }),
        ];
        for event in &events {
            log_network_event(event);
        }
    }
}
