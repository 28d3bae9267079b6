use crate::core::error::{FabricError, Result};
use crate::core::service::HealthProbe;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// `HEAD` request health probe. Any 2xx response counts as reachable.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration> {
        let started = Instant::now();
        let response = self
            .client
            .head(url)
            .header(CACHE_CONTROL, "no-cache")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FabricError::Timeout(timeout.as_millis() as u64)
                } else {
                    FabricError::Probe(format!("{}: {}", url, e))
                }
            })?;

        let status = response.status();
        let elapsed = started.elapsed();
        trace!(url = %url, status = %status, latency_ms = elapsed.as_millis() as u64, "Health probe answered");
        if !status.is_success() {
            return Err(FabricError::Probe(format!("{} returned {}", url, status)));
        }
        Ok(elapsed)
    }
}
