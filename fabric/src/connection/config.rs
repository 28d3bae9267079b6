use crate::utils::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection manager settings. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub url: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_interval_base: u64,
    pub reconnect_interval_cap: u64,
    /// An abnormal close this soon after opening means the endpoint is down.
    pub immediate_close_window_ms: u64,
    /// Answer server heartbeat pings.
    pub heartbeat_respond: bool,
    /// Send our own heartbeat ping on this interval while connected.
    pub heartbeat_interval_ms: Option<u64>,
    pub max_outbound_queue: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/api/ws".to_string(),
            max_reconnect_attempts: 5,
            reconnect_interval_base: 1000,
            reconnect_interval_cap: 30_000,
            immediate_close_window_ms: 1000,
            heartbeat_respond: true,
            heartbeat_interval_ms: None,
            max_outbound_queue: 100,
        }
    }
}

impl ConnectionConfig {
    /// Defaults overridden by the environment.
    ///
    /// - `FABRIC_WS_URL`: endpoint; otherwise derived from `API_BASE_URL`
    /// - `FABRIC_WS_MAX_RECONNECT`: reconnect attempt budget
    /// - `FABRIC_WS_HEARTBEAT_MS`: client heartbeat interval
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let url = lib_utils::get_env("FABRIC_WS_URL").unwrap_or_else(|_| socket_url_from_api_base());
        Self {
            url,
            max_reconnect_attempts: lib_utils::get_env_or(
                "FABRIC_WS_MAX_RECONNECT",
                defaults.max_reconnect_attempts,
            ),
            heartbeat_interval_ms: lib_utils::get_env_parse("FABRIC_WS_HEARTBEAT_MS").ok(),
            ..defaults
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect_interval_base),
            Duration::from_millis(self.reconnect_interval_cap),
        )
    }

    pub fn immediate_close_window(&self) -> Duration {
        Duration::from_millis(self.immediate_close_window_ms)
    }
}

fn socket_url_from_api_base() -> String {
    let base_url = lib_utils::get_env("API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3001".to_string());
    base_url
        .trim_end_matches('/')
        .replace("http://", "ws://")
        .replace("https://", "wss://")
        + "/api/ws"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_interval_base, 1000);
        assert_eq!(config.reconnect_interval_cap, 30_000);
        assert_eq!(config.max_outbound_queue, 100);
        assert!(config.heartbeat_respond);
        assert_eq!(config.backoff().base_delay(10), Duration::from_millis(30_000));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"url":"wss://example.org/ws","maxReconnectAttempts":2}"#)
                .unwrap();
        assert_eq!(config.url, "wss://example.org/ws");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.immediate_close_window_ms, 1000);
    }
}
