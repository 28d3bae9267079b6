use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Offline fabric settings. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflineConfig {
    pub polling_interval: u64,
    /// Per-probe timeout.
    pub timeout_duration: u64,
    pub max_retries: u32,
    pub slow_connection_threshold: u64,
    pub fast_connection_threshold: u64,
    /// Probed in order; the first success wins the round.
    pub health_check_urls: Vec<String>,
    pub enable_queue: bool,
    pub max_queue_size: usize,
    pub queue_storage_key: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            polling_interval: 30_000,
            timeout_duration: 5_000,
            max_retries: 3,
            slow_connection_threshold: 2_000,
            fast_connection_threshold: 300,
            health_check_urls: vec![default_health_url()],
            enable_queue: true,
            max_queue_size: 100,
            queue_storage_key: "offlineQueue".to_string(),
        }
    }
}

impl OfflineConfig {
    /// Defaults overridden by the environment.
    ///
    /// - `FABRIC_HEALTH_URLS`: comma-separated probe targets
    /// - `FABRIC_POLL_MS`: polling interval
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let health_check_urls = lib_utils::get_env_list("FABRIC_HEALTH_URLS")
            .ok()
            .filter(|urls| !urls.is_empty())
            .unwrap_or(defaults.health_check_urls.clone());
        Self {
            polling_interval: lib_utils::get_env_or("FABRIC_POLL_MS", defaults.polling_interval),
            health_check_urls,
            ..defaults
        }
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_duration)
    }
}

fn default_health_url() -> String {
    let base_url = lib_utils::get_env("API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3001".to_string());
    format!("{}/api/health", base_url.trim_end_matches('/'))
}
