//! # Connection Manager
//!
//! One long-lived transport multiplexed across logical channels.
//!
//! Each open transport belongs to a *generation*. Every state-changing call
//! bumps the generation, and callbacks from an older generation are ignored,
//! so at most one transport is ever live. A session is two tasks:
//!
//! - the **reader** (`connection_session`) opens the transport, routes
//!   incoming frames to handlers and reacts to the close event
//! - the **writer** (`connection_writer`) owns the sink and drains an
//!   unbounded channel; when a write fails, the failed envelope and all
//!   still-buffered ones go back to the head of the outbound queue
//!
//! Handlers run on the reader task, outside every lock, in arrival order.

use super::config::ConnectionConfig;
use super::outbound::OutboundQueue;
use super::state::ConnectionState;
use super::subscriptions::SubscriptionRegistry;
use crate::core::error::ErrorRecord;
use crate::core::service::{
    FrameSink, Transport, TransportEvent, TransportSession, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use crate::debug::{spawn_tracked, ErrorAggregator, Logger};
use crate::events::{Detach, Listener};
use crate::utils::Backoff;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared::dto::{
    is_reserved_channel, message_type, Envelope, ErrorCategory, CONNECTION_CHANNEL,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Cancel handle returned by [`ConnectionManager::subscribe`].
pub type Subscription = Listener;

enum WriterCommand {
    Frame(Envelope),
    Close(u16),
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    subscriptions: SubscriptionRegistry,
    outbound: OutboundQueue,
    writer: Option<mpsc::UnboundedSender<WriterCommand>>,
    reconnect_attempts: u32,
    session_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
}

struct Shared {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    backoff: Backoff,
    client_id: String,
    log: Logger,
    errors: ErrorAggregator,
    state_tx: watch::Sender<ConnectionState>,
    inner: Mutex<Inner>,
}

/// Cheap cloneable handle to one shared connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        let log = Logger::new("connection");
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Inner {
            state: ConnectionState::Disconnected,
            generation: 0,
            subscriptions: SubscriptionRegistry::new(),
            outbound: OutboundQueue::new(config.max_outbound_queue),
            writer: None,
            reconnect_attempts: 0,
            session_task: None,
            reconnect_task: None,
            heartbeat_task: None,
        };
        Self {
            shared: Arc::new(Shared {
                backoff: config.backoff(),
                client_id: uuid::Uuid::new_v4().to_string(),
                errors: ErrorAggregator::new(log.clone()),
                log,
                state_tx,
                inner: Mutex::new(inner),
                transport,
                config,
            }),
        }
    }

    /// Register `handler` for `channel`.
    ///
    /// The first handler of a channel sends a server `subscribe` while
    /// connected; later handlers only join locally. Subscribing to a regular
    /// channel while disconnected starts connecting.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let shared = &self.shared;
        let (id, should_connect) = {
            let mut inner = shared.inner.lock();
            let (id, new_channel) = inner.subscriptions.add(channel, Arc::new(handler));
            let reserved = is_reserved_channel(channel);
            if new_channel && !reserved && inner.state == ConnectionState::Connected {
                let envelope = Envelope::subscribe(channel, &shared.client_id);
                shared.write_control_locked(&mut inner, envelope);
            }
            (id, !reserved && inner.state == ConnectionState::Disconnected)
        };

        shared
            .log
            .debug("Handler subscribed")
            .field("channel", channel)
            .field("handler_id", id)
            .emit();

        if should_connect {
            self.connect();
        }

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let target: Weak<dyn Detach> = weak;
        Listener::new(id, target)
    }

    /// Send a fresh envelope. Returns true if it was handed to an open
    /// transport, false if it was queued for the next open.
    pub fn send(&self, message_type: &str, channel: &str, data: Value) -> bool {
        let envelope = Envelope::new(message_type, channel, data, self.shared.client_id.as_str());
        self.send_envelope(envelope)
    }

    pub fn send_envelope(&self, envelope: Envelope) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state == ConnectionState::Connected {
            return self.shared.write_locked(&mut inner, envelope);
        }
        self.shared.enqueue_locked(&mut inner, envelope);
        false
    }

    /// Start connecting unless a transport is already open or being opened.
    pub fn connect(&self) {
        let notice = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_active() {
                trace!(state = %inner.state, "connect() ignored, already active");
                return;
            }
            self.shared.start_session_locked(&mut inner)
        };
        self.shared.notify(notice);
    }

    /// Close the transport with a normal close, cancel pending reconnects and
    /// drop the outbound queue. Subscriptions stay registered.
    pub fn disconnect(&self) {
        let notice = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            self.shared.stop_session_locked(&mut inner);
            let dropped = inner.outbound.clear();
            inner.reconnect_attempts = 0;
            self.shared
                .log
                .info("Disconnect requested")
                .field("dropped_messages", dropped)
                .emit();
            self.shared
                .transition_locked(&mut inner, ConnectionState::Disconnected)
        };
        self.shared.notify(notice);
    }

    /// Tear down any session and start over with a fresh attempt budget.
    /// The outbound queue is kept. This is the only way out of `Error`.
    pub fn reconnect(&self) {
        let notice = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            self.shared.stop_session_locked(&mut inner);
            inner.reconnect_attempts = 0;
            self.shared.log.info("Reconnect requested").emit();
            self.shared.start_session_locked(&mut inner)
        };
        self.shared.notify(notice);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn outbound_len(&self) -> usize {
        self.shared.inner.lock().outbound.len()
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.shared.inner.lock().subscriptions.channels()
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.shared.inner.lock().subscriptions.handler_count(channel)
    }

    /// Whether the server acknowledged `channel` on the current transport.
    pub fn is_acknowledged(&self, channel: &str) -> bool {
        self.shared.inner.lock().subscriptions.is_acknowledged(channel)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().reconnect_attempts
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.shared.errors.recent()
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.log
    }
}

impl Shared {
    fn start_session_locked(self: &Arc<Self>, inner: &mut Inner) -> Option<Envelope> {
        inner.generation += 1;
        let generation = inner.generation;
        let notice = self.transition_locked(inner, ConnectionState::Connecting);
        let shared = self.clone();
        inner.session_task = Some(spawn_tracked("connection_session", async move {
            shared.run_session(generation).await;
        }));
        notice
    }

    fn stop_session_locked(&self, inner: &mut Inner) {
        for task in [
            inner.reconnect_task.take(),
            inner.heartbeat_task.take(),
            inner.session_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        if let Some(writer) = inner.writer.take() {
            let _ = writer.send(WriterCommand::Close(CLOSE_NORMAL));
        }
        inner.subscriptions.reset_acknowledgements();
    }

    async fn run_session(self: Arc<Self>, generation: u64) {
        let url = self.config.url.clone();
        self.log
            .info("Opening connection")
            .field("url", url.as_str())
            .field("generation", generation)
            .emit();

        let TransportSession {
            mut sink,
            mut source,
        } = match self.transport.open(&url).await {
            Ok(session) => session,
            Err(e) => {
                self.log
                    .warn("Failed to open connection")
                    .field("url", url.as_str())
                    .field("error", e.to_string())
                    .emit();
                self.handle_closed(generation, CLOSE_ABNORMAL, e.to_string(), None);
                return;
            }
        };
        let opened_at = Instant::now();

        let Some((commands, notice)) = self.handle_open(generation) else {
            let _ = sink.close(CLOSE_NORMAL).await;
            return;
        };
        self.notify(notice);

        let writer = self.clone();
        spawn_tracked("connection_writer", async move {
            writer.run_writer(generation, sink, commands).await;
        });

        loop {
            match source.next_event().await {
                TransportEvent::Frame(text) => self.handle_frame(generation, &text),
                TransportEvent::Closed { code, reason } => {
                    self.handle_closed(generation, code, reason, Some(opened_at.elapsed()));
                    break;
                }
            }
        }
    }

    async fn run_writer(
        self: Arc<Self>,
        generation: u64,
        mut sink: Box<dyn FrameSink>,
        mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    ) {
        while let Some(command) = commands.recv().await {
            match command {
                WriterCommand::Frame(envelope) => {
                    let frame = match envelope.to_json() {
                        Ok(frame) => frame,
                        Err(e) => {
                            self.log
                                .error("Failed to serialize envelope")
                                .field("message_type", envelope.message_type.clone())
                                .field("error", e.to_string())
                                .emit();
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(frame).await {
                        commands.close();
                        let mut unsent = vec![envelope];
                        while let Ok(command) = commands.try_recv() {
                            if let WriterCommand::Frame(envelope) = command {
                                unsent.push(envelope);
                            }
                        }
                        self.log
                            .warn("Send failed, returning messages to the outbound queue")
                            .field("error", e.to_string())
                            .field("count", unsent.len())
                            .emit();
                        self.requeue(generation, unsent);
                        return;
                    }
                }
                WriterCommand::Close(code) => {
                    if let Err(e) = sink.close(code).await {
                        trace!(error = %e, "Close frame not delivered");
                    }
                    return;
                }
            }
        }
    }

    fn handle_open(
        self: &Arc<Self>,
        generation: u64,
    ) -> Option<(mpsc::UnboundedReceiver<WriterCommand>, Option<Envelope>)> {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let queued = inner.outbound.drain();
        let flushed = queued.len();
        for envelope in queued {
            let _ = tx.send(WriterCommand::Frame(envelope));
        }
        let channels: Vec<String> = inner
            .subscriptions
            .channels()
            .into_iter()
            .filter(|c| !is_reserved_channel(c))
            .collect();
        for channel in &channels {
            let _ = tx.send(WriterCommand::Frame(Envelope::subscribe(channel, &self.client_id)));
        }

        inner.writer = Some(tx);
        inner.reconnect_attempts = 0;
        if let Some(ms) = self.config.heartbeat_interval_ms.filter(|ms| *ms > 0) {
            inner.heartbeat_task = Some(self.spawn_heartbeat(generation, Duration::from_millis(ms)));
        }

        self.log
            .info("Connection open")
            .field("flushed", flushed)
            .field("resubscribed", channels.len())
            .emit();
        let notice = self.transition_locked(&mut inner, ConnectionState::Connected);
        Some((rx, notice))
    }

    fn handle_frame(&self, generation: u64, text: &str) {
        let envelope = match Envelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.log
                    .warn("Failed to parse incoming frame")
                    .field("error", e.to_string())
                    .field("frame_len", text.len())
                    .emit();
                self.deliver(&Envelope::raw_message(text, &e.to_string(), &self.client_id));
                return;
            }
        };

        if envelope.is_heartbeat_ping() && self.config.heartbeat_respond {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                let pong = Envelope::heartbeat_pong(&self.client_id);
                self.write_control_locked(&mut inner, pong);
            }
        }
        if let Some(channel) = envelope.acknowledged_channel() {
            let known = self.inner.lock().subscriptions.mark_acknowledged(channel);
            self.log
                .debug("Subscription acknowledged")
                .field("channel", channel)
                .field("known", known)
                .emit();
        }
        if envelope.message_type == message_type::CONNECTION_ACK {
            self.log
                .info("Connection acknowledged")
                .field("data", envelope.data.clone())
                .emit();
        }

        self.deliver(&envelope);
    }

    fn handle_closed(
        self: &Arc<Self>,
        generation: u64,
        code: u16,
        reason: String,
        open_for: Option<Duration>,
    ) {
        let notice = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            inner.writer = None;
            inner.session_task = None;
            if let Some(task) = inner.heartbeat_task.take() {
                task.abort();
            }
            inner.subscriptions.reset_acknowledgements();

            let immediate = code != CLOSE_NORMAL
                && open_for.is_some_and(|d| d < self.config.immediate_close_window());

            if code == CLOSE_NORMAL && open_for.is_some() {
                inner.reconnect_attempts = 0;
                self.log
                    .info("Connection closed cleanly")
                    .field("reason", reason)
                    .emit();
                self.transition_locked(&mut inner, ConnectionState::Disconnected)
            } else if immediate {
                let open_ms = open_for.map(|d| d.as_millis() as u64).unwrap_or(0);
                let message = format!(
                    "endpoint unavailable: closed {}ms after open (code {}, {})",
                    open_ms, code, reason
                );
                self.fail_locked(&mut inner, message)
            } else if inner.reconnect_attempts >= self.config.max_reconnect_attempts {
                let message = format!(
                    "gave up after {} reconnect attempts (code {}, {})",
                    inner.reconnect_attempts, code, reason
                );
                self.fail_locked(&mut inner, message)
            } else {
                let attempt = inner.reconnect_attempts;
                inner.reconnect_attempts += 1;
                let delay = self.backoff.delay(attempt);
                self.log
                    .warn("Connection lost, scheduling reconnect")
                    .field("code", code)
                    .field("reason", reason)
                    .field("attempt", attempt + 1)
                    .field("max_attempts", self.config.max_reconnect_attempts)
                    .field("delay_ms", delay.as_millis() as u64)
                    .emit();

                let shared = self.clone();
                inner.reconnect_task = Some(spawn_tracked("connection_reconnect", async move {
                    tokio::time::sleep(delay).await;
                    shared.fire_reconnect(generation);
                }));
                self.transition_locked(&mut inner, ConnectionState::Reconnecting)
            }
        };
        self.notify(notice);
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let notice = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != ConnectionState::Reconnecting {
                return;
            }
            inner.reconnect_task = None;
            self.start_session_locked(&mut inner)
        };
        self.notify(notice);
    }

    fn fail_locked(&self, inner: &mut Inner, message: String) -> Option<Envelope> {
        let record = ErrorRecord::new(ErrorCategory::NetworkError, "connection.session", message)
            .with_context(json!({
                "url": self.config.url,
                "attempts": inner.reconnect_attempts,
            }));
        self.errors.record(record);
        self.transition_locked(inner, ConnectionState::Error)
    }

    fn requeue(&self, generation: u64, unsent: Vec<Envelope>) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Disconnected {
            trace!(count = unsent.len(), "Dropping unsent messages after disconnect");
            return;
        }
        if inner.generation == generation {
            inner.writer = None;
        } else if inner.state == ConnectionState::Connected {
            for envelope in unsent {
                self.write_locked(&mut inner, envelope);
            }
            return;
        }
        let dropped = inner.outbound.requeue_front(unsent);
        self.log_dropped(&dropped);
    }

    fn spawn_heartbeat(self: &Arc<Self>, generation: u64, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        spawn_tracked("connection_heartbeat", async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.send_heartbeat(generation) {
                    break;
                }
            }
        })
    }

    fn send_heartbeat(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return false;
        }
        let ping = Envelope::heartbeat_ping(&self.client_id);
        self.write_control_locked(&mut inner, ping);
        true
    }

    /// Hand `envelope` to the writer, queueing it if the writer is gone.
    fn write_locked(&self, inner: &mut Inner, envelope: Envelope) -> bool {
        let rejected = match &inner.writer {
            Some(writer) => match writer.send(WriterCommand::Frame(envelope)) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(command)) => command,
            },
            None => WriterCommand::Frame(envelope),
        };
        inner.writer = None;
        if let WriterCommand::Frame(envelope) = rejected {
            self.enqueue_locked(inner, envelope);
        }
        false
    }

    /// Like [`Shared::write_locked`], but control frames are never queued:
    /// subscriptions are replayed on open and heartbeats are only meaningful now.
    fn write_control_locked(&self, inner: &mut Inner, envelope: Envelope) {
        let sent = inner
            .writer
            .as_ref()
            .is_some_and(|writer| writer.send(WriterCommand::Frame(envelope)).is_ok());
        if !sent {
            inner.writer = None;
        }
    }

    fn enqueue_locked(&self, inner: &mut Inner, envelope: Envelope) {
        let dropped = inner.outbound.push_back(envelope);
        self.log_dropped(&dropped);
    }

    fn log_dropped(&self, dropped: &[Envelope]) {
        for envelope in dropped {
            self.log
                .warn("Outbound queue full, dropping oldest message")
                .field("message_type", envelope.message_type.clone())
                .field("channel", envelope.channel.clone())
                .field("capacity", self.config.max_outbound_queue)
                .emit();
        }
    }

    fn transition_locked(&self, inner: &mut Inner, next: ConnectionState) -> Option<Envelope> {
        let previous = inner.state;
        if previous == next {
            return None;
        }
        inner.state = next;
        self.state_tx.send_replace(next);
        self.log
            .info("Connection state changed")
            .field("from", previous.as_str())
            .field("to", next.as_str())
            .emit();
        Some(Envelope::new(
            message_type::CONNECTION_STATE,
            CONNECTION_CHANNEL,
            json!({ "state": next.as_str(), "previous": previous.as_str() }),
            self.client_id.as_str(),
        ))
    }

    fn notify(&self, notice: Option<Envelope>) {
        if let Some(envelope) = notice {
            self.deliver(&envelope);
        }
    }

    fn deliver(&self, envelope: &Envelope) {
        let handlers = self.inner.lock().subscriptions.handlers_for(&envelope.channel);
        if handlers.is_empty() {
            trace!(channel = %envelope.channel, message_type = %envelope.message_type, "No handler for message");
            return;
        }
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(envelope))).is_err() {
                self.log
                    .error("Message handler panicked")
                    .field("channel", envelope.channel.clone())
                    .field("message_type", envelope.message_type.clone())
                    .emit();
            }
        }
    }
}

impl Detach for Shared {
    fn detach(&self, id: u64) {
        let channel = {
            let mut inner = self.inner.lock();
            let Some((channel, emptied)) = inner.subscriptions.remove(id) else {
                return;
            };
            if emptied && !is_reserved_channel(&channel) && inner.state == ConnectionState::Connected {
                let envelope = Envelope::unsubscribe(&channel, &self.client_id);
                self.write_control_locked(&mut inner, envelope);
            }
            channel
        };
        self.log
            .debug("Handler unsubscribed")
            .field("channel", channel)
            .field("handler_id", id)
            .emit();
    }
}
