//! Probe history and connection quality classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Probe results kept in history.
pub const SAMPLE_HISTORY: usize = 10;
/// Most recent probe results used for classification.
pub const CLASSIFY_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Unknown,
    Poor,
    Slow,
    Good,
    Fast,
}

impl ConnectionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Unknown => "unknown",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Slow => "slow",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Fast => "fast",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One probe round.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    pub success: bool,
    pub latency: Option<Duration>,
    pub at: DateTime<Utc>,
}

impl ProbeSample {
    pub fn success(latency: Duration, at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            latency: Some(latency),
            at,
        }
    }

    pub fn failure(at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            latency: None,
            at,
        }
    }
}

/// Snapshot published to observers. Latency in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub is_online: bool,
    pub connection_quality: ConnectionQuality,
    pub average_latency: f64,
    pub success_rate: f64,
    pub last_online_time: Option<DateTime<Utc>>,
    pub last_offline_time: Option<DateTime<Utc>>,
}

impl Default for NetworkState {
    /// Optimistically online until the first probe says otherwise.
    fn default() -> Self {
        Self {
            is_online: true,
            connection_quality: ConnectionQuality::Unknown,
            average_latency: 0.0,
            success_rate: 0.0,
            last_online_time: None,
            last_offline_time: None,
        }
    }
}

/// Classification of a sample window: `(quality, average latency ms, success rate)`.
pub fn classify(
    samples: &[ProbeSample],
    slow_threshold: Duration,
    fast_threshold: Duration,
) -> (ConnectionQuality, f64, f64) {
    if samples.is_empty() {
        return (ConnectionQuality::Unknown, 0.0, 0.0);
    }

    let latencies: Vec<f64> = samples
        .iter()
        .filter(|s| s.success)
        .filter_map(|s| s.latency)
        .map(|l| l.as_secs_f64() * 1000.0)
        .collect();
    let success_rate = latencies.len() as f64 / samples.len() as f64;
    let average_latency = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let slow_ms = slow_threshold.as_secs_f64() * 1000.0;
    let fast_ms = fast_threshold.as_secs_f64() * 1000.0;
    let quality = if success_rate < 0.5 {
        ConnectionQuality::Poor
    } else if success_rate < 0.8 || average_latency > slow_ms {
        ConnectionQuality::Slow
    } else if average_latency < fast_ms {
        ConnectionQuality::Fast
    } else {
        ConnectionQuality::Good
    };
    (quality, average_latency, success_rate)
}

/// Rolling probe history and the state derived from it.
#[derive(Debug)]
pub struct NetworkMonitor {
    samples: VecDeque<ProbeSample>,
    state: NetworkState,
    slow_threshold: Duration,
    fast_threshold: Duration,
}

impl NetworkMonitor {
    pub fn new(slow_threshold: Duration, fast_threshold: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_HISTORY),
            state: NetworkState::default(),
            slow_threshold,
            fast_threshold,
        }
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Record a probe round. Returns the state before and after.
    pub fn record(&mut self, sample: ProbeSample) -> (NetworkState, NetworkState) {
        let previous = self.state.clone();
        let at = sample.at;
        let online = sample.success;

        if self.samples.len() == SAMPLE_HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        let window: Vec<ProbeSample> = self
            .samples
            .iter()
            .rev()
            .take(CLASSIFY_WINDOW)
            .cloned()
            .collect();
        let (quality, average_latency, success_rate) =
            classify(&window, self.slow_threshold, self.fast_threshold);
        self.state.connection_quality = quality;
        self.state.average_latency = average_latency;
        self.state.success_rate = success_rate;
        self.set_online(online, at);

        (previous, self.state.clone())
    }

    /// Apply an external offline/online hint without touching the history.
    pub fn set_online(&mut self, online: bool, at: DateTime<Utc>) -> (NetworkState, NetworkState) {
        let previous = self.state.clone();
        if online && (!previous.is_online || self.state.last_online_time.is_none()) {
            self.state.last_online_time = Some(at);
        }
        if !online && previous.is_online {
            self.state.last_offline_time = Some(at);
        }
        self.state.is_online = online;
        (previous, self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn ok(ms: u64) -> ProbeSample {
        ProbeSample::success(Duration::from_millis(ms), at())
    }

    fn fail() -> ProbeSample {
        ProbeSample::failure(at())
    }

    fn quality(samples: &[ProbeSample]) -> ConnectionQuality {
        classify(
            samples,
            Duration::from_millis(2000),
            Duration::from_millis(300),
        )
        .0
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(quality(&[]), ConnectionQuality::Unknown);
        assert_eq!(quality(&[ok(100), fail(), fail()]), ConnectionQuality::Poor);
        // 3/4 = 0.75 success is slow even with fast latency
        assert_eq!(
            quality(&[ok(50), ok(50), ok(50), fail()]),
            ConnectionQuality::Slow
        );
        assert_eq!(quality(&[ok(2500), ok(2500)]), ConnectionQuality::Slow);
        assert_eq!(quality(&[ok(100), ok(200)]), ConnectionQuality::Fast);
        assert_eq!(quality(&[ok(300), ok(1000)]), ConnectionQuality::Good);
    }

    #[test]
    fn test_average_ignores_failures() {
        let (_, avg, rate) = classify(
            &[ok(100), ok(300), fail(), ok(200), ok(400)],
            Duration::from_millis(2000),
            Duration::from_millis(300),
        );
        assert_eq!(avg, 250.0);
        assert_eq!(rate, 0.8);
    }

    #[test]
    fn test_history_is_bounded_and_window_is_recent() {
        let mut monitor = NetworkMonitor::new(Duration::from_millis(2000), Duration::from_millis(300));
        for _ in 0..8 {
            monitor.record(fail());
        }
        for _ in 0..5 {
            monitor.record(ok(100));
        }
        assert_eq!(monitor.sample_count(), SAMPLE_HISTORY);
        // only the five successes are classified
        assert_eq!(monitor.state().success_rate, 1.0);
        assert_eq!(monitor.state().connection_quality, ConnectionQuality::Fast);
    }

    #[test]
    fn test_transition_timestamps() {
        let mut monitor = NetworkMonitor::new(Duration::from_millis(2000), Duration::from_millis(300));
        let (before, after) = monitor.record(ok(100));
        assert!(before.is_online);
        assert!(after.is_online);
        assert_eq!(after.last_online_time, Some(at()));

        let (_, offline) = monitor.record(fail());
        assert!(!offline.is_online);
        assert_eq!(offline.last_offline_time, Some(at()));

        let (previous, current) = monitor.set_online(true, at());
        assert!(!previous.is_online);
        assert!(current.is_online);
    }
}
