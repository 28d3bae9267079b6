//! # Offline Fabric
//!
//! Tracks authoritative connectivity through periodic health probes and
//! keeps a durable queue of requests that replays once the network is back.
//!
//! Connectivity hints from the host (an OS or browser online/offline flag)
//! only start things off: an offline hint marks the fabric offline at once,
//! an online hint runs a probe round that decides.
//!
//! Replay is sequential in insertion order and never overlaps itself. A
//! handler that fails or panics bumps the request's `retryCount`; at
//! `maxRetries` the request is dropped for good.

use super::config::OfflineConfig;
use super::network::{ConnectionQuality, NetworkMonitor, NetworkState, ProbeSample};
use super::probe::HttpProbe;
use super::queue::RequestQueue;
use crate::core::error::{ErrorRecord, FabricError, Result};
use crate::core::service::{HealthProbe, ReplayHandler};
use crate::debug::{spawn_tracked, with_trace_id, ErrorAggregator, Logger};
use crate::events::{EventBus, Listener};
use crate::store::{default_store, Store};
use crate::utils::{SharedClock, SystemClock};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use shared::dto::QueuedRequest;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Outcome of one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub successful: usize,
    pub failed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OfflineEvent {
    Online(NetworkState),
    Offline(NetworkState),
    ConnectionChange {
        current: ConnectionQuality,
        previous: ConnectionQuality,
    },
    SlowConnection(NetworkState),
    FastConnection(NetworkState),
    QueueProcessed(QueueSummary),
}

struct FnReplayHandler<F>(F);

#[async_trait]
impl<F, Fut> ReplayHandler for FnReplayHandler<F>
where
    F: Fn(QueuedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn replay(&self, request: &QueuedRequest) -> Result<()> {
        (self.0)(request.clone()).await
    }
}

struct Shared {
    config: OfflineConfig,
    probe: Arc<dyn HealthProbe>,
    store: Arc<dyn Store>,
    clock: SharedClock,
    log: Logger,
    errors: ErrorAggregator,
    events: EventBus<OfflineEvent>,
    network: Mutex<NetworkMonitor>,
    queue: Mutex<RequestQueue>,
    handlers: RwLock<HashMap<String, Arc<dyn ReplayHandler>>>,
    processing: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Clears the processing flag when a replay run ends, however it ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cheap cloneable handle to one offline fabric.
#[derive(Clone)]
pub struct OfflineFabric {
    shared: Arc<Shared>,
}

impl OfflineFabric {
    pub fn new(config: OfflineConfig, probe: Arc<dyn HealthProbe>, store: Arc<dyn Store>) -> Self {
        Self::with_clock(config, probe, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: OfflineConfig,
        probe: Arc<dyn HealthProbe>,
        store: Arc<dyn Store>,
        clock: SharedClock,
    ) -> Self {
        let log = Logger::new("offline");
        let queue = RequestQueue::load(
            store.as_ref(),
            &config.queue_storage_key,
            config.max_queue_size,
            &log,
        );
        let network = NetworkMonitor::new(
            std::time::Duration::from_millis(config.slow_connection_threshold),
            std::time::Duration::from_millis(config.fast_connection_threshold),
        );
        Self {
            shared: Arc::new(Shared {
                errors: ErrorAggregator::new(log.clone()),
                log,
                events: EventBus::new(),
                network: Mutex::new(network),
                queue: Mutex::new(queue),
                handlers: RwLock::new(HashMap::new()),
                processing: AtomicBool::new(false),
                poll_task: Mutex::new(None),
                config,
                probe,
                store,
                clock,
            }),
        }
    }

    /// HTTP probes and the default file store, configured from the environment.
    pub fn from_env() -> Self {
        Self::new(
            OfflineConfig::from_env(),
            Arc::new(HttpProbe::new()),
            default_store(),
        )
    }

    // region:    --- Lifecycle

    /// Probe now and then every `pollingInterval`. Calling again restarts
    /// the loop.
    pub fn start(&self) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let interval = self.shared.config.polling_interval();
        let task = spawn_tracked("offline_polling", async move {
            loop {
                let Some(shared) = weak.upgrade() else { break };
                OfflineFabric { shared }.check_connection().await;
                tokio::time::sleep(interval).await;
            }
        });
        if let Some(previous) = self.shared.poll_task.lock().replace(task) {
            previous.abort();
        }
        self.shared
            .log
            .info("Connectivity polling started")
            .field("interval_ms", interval.as_millis() as u64)
            .emit();
    }

    /// Stop polling. Queue and network state are kept.
    pub fn stop(&self) {
        if let Some(task) = self.shared.poll_task.lock().take() {
            task.abort();
            self.shared.log.info("Connectivity polling stopped").emit();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .poll_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // endregion: --- Lifecycle

    // region:    --- Connectivity

    /// Run one probe round over the health URLs. Returns whether the
    /// network is considered online afterwards.
    pub async fn check_connection(&self) -> bool {
        let shared = &self.shared;
        let urls = &shared.config.health_check_urls;
        if urls.is_empty() {
            shared
                .log
                .debug("No health URLs configured, skipping probe")
                .emit();
            return self.is_online();
        }

        let timeout = shared.config.probe_timeout();
        let mut latency = None;
        for url in urls {
            match tokio::time::timeout(timeout, shared.probe.probe(url, timeout)).await {
                Ok(Ok(elapsed)) => {
                    latency = Some(elapsed);
                    break;
                }
                Ok(Err(e)) => shared
                    .log
                    .debug("Health probe failed")
                    .field("url", url.as_str())
                    .field("error", e.to_string())
                    .emit(),
                Err(_) => shared
                    .log
                    .debug("Health probe timed out")
                    .field("url", url.as_str())
                    .field("timeout_ms", timeout.as_millis() as u64)
                    .emit(),
            }
        }

        let now = shared.clock.now_utc();
        let sample = match latency {
            Some(latency) => ProbeSample::success(latency, now),
            None => ProbeSample::failure(now),
        };
        let (previous, current) = shared.network.lock().record(sample);
        self.publish(&previous, &current);
        current.is_online
    }

    /// Host-reported connectivity change. Offline takes effect immediately;
    /// online is confirmed by a probe round.
    pub async fn handle_connectivity_hint(&self, online: bool) {
        self.shared
            .log
            .debug("Connectivity hint")
            .field("online", online)
            .emit();
        if online {
            self.check_connection().await;
        } else {
            let now = self.shared.clock.now_utc();
            let (previous, current) = self.shared.network.lock().set_online(false, now);
            self.publish(&previous, &current);
        }
    }

    fn publish(&self, previous: &NetworkState, current: &NetworkState) {
        let shared = &self.shared;
        if !previous.is_online && current.is_online {
            shared
                .log
                .info("Network back online")
                .field("queue_size", self.queue_size())
                .emit();
            shared.events.emit(&OfflineEvent::Online(current.clone()));
            if !shared.queue.lock().is_empty() {
                let fabric = self.clone();
                spawn_tracked("offline_replay", async move {
                    fabric.process_queue().await;
                });
            }
        } else if previous.is_online && !current.is_online {
            shared.log.warn("Network offline").emit();
            shared.events.emit(&OfflineEvent::Offline(current.clone()));
        }

        if previous.connection_quality != current.connection_quality {
            shared
                .log
                .info("Connection quality changed")
                .field("quality", current.connection_quality.as_str())
                .field("previous", previous.connection_quality.as_str())
                .field("average_latency_ms", current.average_latency)
                .field("success_rate", current.success_rate)
                .emit();
            shared.events.emit(&OfflineEvent::ConnectionChange {
                current: current.connection_quality,
                previous: previous.connection_quality,
            });
            match current.connection_quality {
                ConnectionQuality::Slow | ConnectionQuality::Poor => shared
                    .events
                    .emit(&OfflineEvent::SlowConnection(current.clone())),
                ConnectionQuality::Fast => shared
                    .events
                    .emit(&OfflineEvent::FastConnection(current.clone())),
                ConnectionQuality::Good | ConnectionQuality::Unknown => {}
            }
        }
    }

    // endregion: --- Connectivity

    // region:    --- Queue

    /// Register the replay handler for `request_type`, replacing any previous one.
    pub fn register_handler(&self, request_type: &str, handler: Arc<dyn ReplayHandler>) {
        self.shared
            .handlers
            .write()
            .insert(request_type.to_string(), handler);
    }

    /// [`register_handler`](Self::register_handler) for an async closure.
    pub fn register_fn<F, Fut>(&self, request_type: &str, handler: F)
    where
        F: Fn(QueuedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register_handler(request_type, Arc::new(FnReplayHandler(handler)));
    }

    /// Durably queue a request for replay. Returns its id, or `None` when
    /// queueing is disabled or the store rejected the write.
    pub fn queue_request(&self, request_type: &str, data: Value) -> Option<String> {
        let shared = &self.shared;
        if !shared.config.enable_queue || shared.config.max_queue_size == 0 {
            shared
                .log
                .debug("Offline queue disabled, request not queued")
                .field("type", request_type)
                .emit();
            return None;
        }
        if let Err(e) = lib_utils::validate_not_empty(request_type, "request type") {
            shared
                .errors
                .record(ErrorRecord::from_error(&FabricError::Validation(e), "offline.queue_request"));
            return None;
        }

        let request = QueuedRequest::new(request_type, data, shared.clock.now_millis());
        let id = request.id.clone();
        let mut queue = shared.queue.lock();
        let evicted = queue.push(request);
        if let Err(e) = queue.persist(shared.store.as_ref()) {
            queue.rollback(&id, evicted);
            drop(queue);
            shared.errors.record(
                ErrorRecord::from_error(&FabricError::from(e), "offline.queue_request")
                    .with_context(json!({ "type": request_type })),
            );
            return None;
        }
        let size = queue.len();
        drop(queue);

        for old in &evicted {
            shared
                .log
                .warn("Offline queue full, evicted oldest request")
                .field("evicted_id", old.id.as_str())
                .field("evicted_type", old.request_type.as_str())
                .emit();
        }
        shared
            .log
            .info("Request queued")
            .field("request_id", id.as_str())
            .field("type", request_type)
            .field("queue_size", size)
            .emit();
        Some(id)
    }

    /// Replay the queue now. `None` if a replay is already running.
    pub async fn retry_queue(&self) -> Option<QueueSummary> {
        self.process_queue().await
    }

    /// Drop every queued request, in memory and in the store.
    pub fn clear_queue(&self) {
        let cleared = self.shared.queue.lock().clear();
        self.shared.store.remove(&self.shared.config.queue_storage_key);
        self.shared
            .log
            .info("Offline queue cleared")
            .field("cleared", cleared)
            .emit();
    }

    /// Replay queued requests in insertion order and emit a
    /// [`OfflineEvent::QueueProcessed`] summary. Stops early if the network
    /// drops mid-run.
    pub async fn process_queue(&self) -> Option<QueueSummary> {
        let shared = &self.shared;
        if shared.processing.swap(true, Ordering::SeqCst) {
            shared.log.debug("Replay already running").emit();
            return None;
        }
        let _processing = ProcessingGuard(&shared.processing);
        let pending = shared.queue.lock().snapshot();
        let summary = with_trace_id(crate::debug::new_trace_id(), self.replay_all(pending)).await;
        Some(summary)
    }

    async fn replay_all(&self, pending: Vec<QueuedRequest>) -> QueueSummary {
        let shared = &self.shared;
        shared
            .log
            .info("Replaying offline queue")
            .field("queue_size", pending.len())
            .emit();

        let mut summary = QueueSummary::default();
        for request in pending {
            if !self.is_online() {
                shared
                    .log
                    .info("Network lost during replay, pausing")
                    .emit();
                break;
            }
            let outcome = self.replay_one(&request).await;
            if self.settle(&request, outcome) {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary.remaining = self.queue_size();

        shared
            .log
            .info("Offline queue processed")
            .field("successful", summary.successful)
            .field("failed", summary.failed)
            .field("remaining", summary.remaining)
            .emit();
        shared.events.emit(&OfflineEvent::QueueProcessed(summary));
        summary
    }

    async fn replay_one(&self, request: &QueuedRequest) -> Result<()> {
        let handler = self
            .shared
            .handlers
            .read()
            .get(&request.request_type)
            .cloned();
        let Some(handler) = handler else {
            return Err(FabricError::Handler(format!(
                "no handler registered for '{}'",
                request.request_type
            )));
        };

        let owned = request.clone();
        let trace_id = crate::debug::current_or_new();
        let task = tokio::spawn(with_trace_id(trace_id, async move {
            handler.replay(&owned).await
        }));
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(FabricError::Handler(format!(
                "handler for '{}' panicked",
                request.request_type
            ))),
            Err(e) => Err(FabricError::Handler(e.to_string())),
        }
    }

    /// Apply one replay outcome to the queue and persist it. Returns true on success.
    fn settle(&self, request: &QueuedRequest, outcome: Result<()>) -> bool {
        let shared = &self.shared;
        let mut queue = shared.queue.lock();
        let succeeded = match outcome {
            Ok(()) => {
                queue.remove(&request.id);
                shared
                    .log
                    .debug("Replayed queued request")
                    .field("request_id", request.id.as_str())
                    .field("type", request.request_type.as_str())
                    .emit();
                true
            }
            Err(e) => {
                // cleared while the handler ran
                if let Some(retries) = queue.increment_retry(&request.id) {
                    if retries >= shared.config.max_retries {
                        queue.remove(&request.id);
                        shared
                            .log
                            .warn("Dropping queued request after max retries")
                            .field("request_id", request.id.as_str())
                            .field("type", request.request_type.as_str())
                            .field("retry_count", retries)
                            .emit();
                    }
                }
                shared.errors.record(
                    ErrorRecord::from_error(&e, "offline.replay").with_context(
                        json!({ "requestId": request.id, "type": request.request_type }),
                    ),
                );
                false
            }
        };
        if let Err(e) = queue.persist(shared.store.as_ref()) {
            shared
                .log
                .error("Failed to persist offline queue")
                .field("error", e.to_string())
                .emit();
        }
        succeeded
    }

    // endregion: --- Queue

    // region:    --- Observers

    pub fn subscribe<F>(&self, callback: F) -> Listener
    where
        F: Fn(&OfflineEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    pub fn network_state(&self) -> NetworkState {
        self.shared.network.lock().state().clone()
    }

    pub fn is_online(&self) -> bool {
        self.shared.network.lock().state().is_online
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.shared.network.lock().state().connection_quality
    }

    pub fn is_slow_connection(&self) -> bool {
        matches!(
            self.connection_quality(),
            ConnectionQuality::Slow | ConnectionQuality::Poor
        )
    }

    pub fn is_fast_connection(&self) -> bool {
        self.connection_quality() == ConnectionQuality::Fast
    }

    /// Milliseconds.
    pub fn average_latency(&self) -> f64 {
        self.shared.network.lock().state().average_latency
    }

    pub fn success_rate(&self) -> f64 {
        self.shared.network.lock().state().success_rate
    }

    pub fn queue_size(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn queued_requests(&self) -> Vec<QueuedRequest> {
        self.shared.queue.lock().snapshot()
    }

    pub fn is_processing_queue(&self) -> bool {
        self.shared.processing.load(Ordering::SeqCst)
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.shared.errors.recent()
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.shared.config
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.log
    }

    // endregion: --- Observers
}
