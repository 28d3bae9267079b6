//! # Logging and Diagnostics
//!
//! Structured logging, correlation ids and error bookkeeping shared by every
//! component.
//!
//! ## Features
//!
//! - **File-based logging**: Optional daily-rotated log file next to stderr output
//! - **Log sinks**: Components log through a [`Logger`] that fans events out to
//!   pluggable [`LogSink`]s (tracing by default, in-memory for tests)
//! - **Correlation ids**: Task-local id attached to every log event and [`ErrorRecord`]
//! - **Error ring buffer**: Last errors per component with per-category counts
//! - **Task tracking**: Instrumented `tokio::spawn` for background loops
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fabric::debug::{self, LogConfig, Logger};
//!
//! # fn main() {
//! let _guard = debug::init(&LogConfig::from_env());
//!
//! let log = Logger::new("connection");
//! log.info("Connected").field("url", "wss://example.org/ws").emit();
//! # }
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (e.g., `fabric=debug,info`)
//! - `FABRIC_LOG_DIR`: Enables the rotating log file in this directory
//! - `FABRIC_LOG_FILE`: Log file name (default: `fabric.log`)
//! - `FABRIC_LOG_JSON`: `1` switches stderr output to JSON lines
//!
//! [`ErrorRecord`]: crate::core::error::ErrorRecord

pub mod config;
pub mod error_aggregator;
pub mod logger;
pub mod sink;
pub mod task_tracker;
pub mod trace_context;

pub use config::LogConfig;
pub use error_aggregator::{ErrorAggregator, ErrorStats};
pub use logger::init;
pub use sink::{EventBuilder, LogEvent, LogLevel, LogSink, Logger, MemorySink, TracingSink};
pub use task_tracker::{active_task_count, spawn_tracked};
pub use trace_context::{current_or_new, current_trace_id, new_trace_id, with_trace_id};
