//! Per-component error log
//!
//! Keeps the most recent [`ErrorRecord`]s of one component in a bounded ring,
//! counts errors by category and warns when errors arrive in a storm.

use super::sink::Logger;
use crate::core::error::ErrorRecord;
use parking_lot::Mutex;
use shared::dto::ErrorCategory;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Records kept per component.
pub const DEFAULT_ERROR_CAPACITY: usize = 10;

const STORM_THRESHOLD: usize = 5;
const STORM_WINDOW: Duration = Duration::from_secs(1);
const STORM_WARNING_INTERVAL: Duration = Duration::from_secs(5);

/// Error counts by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStats {
    pub total: u64,
    pub by_category: HashMap<ErrorCategory, u64>,
}

struct AggregatorState {
    recent: VecDeque<(Instant, ErrorRecord)>,
    stats: ErrorStats,
    last_storm_warning: Option<Instant>,
}

pub struct ErrorAggregator {
    log: Logger,
    capacity: usize,
    state: Mutex<AggregatorState>,
}

impl ErrorAggregator {
    pub fn new(log: Logger) -> Self {
        Self::with_capacity(log, DEFAULT_ERROR_CAPACITY)
    }

    pub fn with_capacity(log: Logger, capacity: usize) -> Self {
        Self {
            log,
            capacity: capacity.max(1),
            state: Mutex::new(AggregatorState {
                recent: VecDeque::with_capacity(capacity),
                stats: ErrorStats::default(),
                last_storm_warning: None,
            }),
        }
    }

    /// Log `record` at error level and keep it in the ring.
    pub fn record(&self, record: ErrorRecord) {
        self.log
            .error(record.original_error.clone())
            .correlation(&record.id)
            .field("category", record.code())
            .field("operation", record.operation.clone())
            .field("context", record.context.clone())
            .emit();

        let now = Instant::now();
        let storm = {
            let mut state = self.state.lock();
            state.stats.total += 1;
            *state.stats.by_category.entry(record.category).or_insert(0) += 1;

            if state.recent.len() >= self.capacity {
                state.recent.pop_front();
            }
            state.recent.push_back((now, record));

            let recent_count = state
                .recent
                .iter()
                .rev()
                .take_while(|(at, _)| now.duration_since(*at) < STORM_WINDOW)
                .count();
            let should_warn = state
                .last_storm_warning
                .map(|t| now.duration_since(t) >= STORM_WARNING_INTERVAL)
                .unwrap_or(true);

            if recent_count >= STORM_THRESHOLD && should_warn {
                state.last_storm_warning = Some(now);
                Some(recent_count)
            } else {
                None
            }
        };

        if let Some(count) = storm {
            self.log
                .warn("Error storm detected")
                .field("errors_per_second", count)
                .field("threshold", STORM_THRESHOLD)
                .emit();
        }
    }

    /// Recent records, newest first.
    pub fn recent(&self) -> Vec<ErrorRecord> {
        self.state
            .lock()
            .recent
            .iter()
            .rev()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn last(&self) -> Option<ErrorRecord> {
        self.state.lock().recent.back().map(|(_, r)| r.clone())
    }

    pub fn stats(&self) -> ErrorStats {
        self.state.lock().stats.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.recent.clear();
        state.stats = ErrorStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::sink::{LogLevel, MemorySink};
    use std::sync::Arc;

    fn aggregator(capacity: usize) -> (ErrorAggregator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::with_sinks("test", vec![sink.clone()]);
        (ErrorAggregator::with_capacity(log, capacity), sink)
    }

    #[test]
    fn test_ring_keeps_newest() {
        let (errors, _) = aggregator(3);
        for i in 0..5 {
            errors.record(ErrorRecord::new(ErrorCategory::Timeout, "op", format!("e{}", i)));
        }

        let recent = errors.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].original_error, "e4");
        assert_eq!(recent[2].original_error, "e2");
        assert_eq!(errors.stats().total, 5);
    }

    #[test]
    fn test_counts_by_category() {
        let (errors, sink) = aggregator(10);
        errors.record(ErrorRecord::new(ErrorCategory::Timeout, "op", "a"));
        errors.record(ErrorRecord::new(ErrorCategory::Timeout, "op", "b"));
        errors.record(ErrorRecord::new(ErrorCategory::UserRejected, "op", "c"));

        let stats = errors.stats();
        assert_eq!(stats.by_category[&ErrorCategory::Timeout], 2);
        assert_eq!(stats.by_category[&ErrorCategory::UserRejected], 1);
        assert_eq!(sink.count_at(LogLevel::Error), 3);
    }

    #[test]
    fn test_storm_warning_is_rate_limited() {
        let (errors, sink) = aggregator(10);
        for _ in 0..8 {
            errors.record(ErrorRecord::new(ErrorCategory::NetworkError, "op", "x"));
        }
        assert_eq!(sink.count_at(LogLevel::Warn), 1);
        assert!(sink.contains(LogLevel::Warn, "Error storm"));
    }
}
