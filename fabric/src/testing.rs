//! Scripted test doubles for the service traits.
//!
//! - [`MockTransport`]: in-memory transport; each open yields a [`MockConnection`]
//!   the test drives as the server
//! - [`MockProbe`]: health probe with a switchable outcome
//! - [`MockProvider`]: wallet provider with scripted accounts, errors and delays
//!
//! Waiting helpers panic after a generous timeout instead of hanging.

use crate::core::error::{FabricError, Result};
use crate::core::service::{
    FrameSink, FrameSource, HealthProbe, ProviderEvent, ProviderListener, Transport,
    TransportEvent, TransportSession, WalletProvider, CLOSE_ABNORMAL,
};
use crate::events::{EventBus, Listener};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared::dto::{Chain, Envelope, WalletType};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const WAIT_LIMIT: Duration = Duration::from_secs(300);

/// Poll `condition` every 10ms until it holds.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {:?}", WAIT_LIMIT);
}

// region:    --- Transport

struct TransportInner {
    opens: AtomicUsize,
    failures_left: Mutex<usize>,
    open_delay: Mutex<Option<Duration>>,
    connections_tx: mpsc::UnboundedSender<MockConnection>,
    connections_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockConnection>>,
    history: Mutex<Vec<MockConnection>>,
}

#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<TransportInner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (connections_tx, connections_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(TransportInner {
                opens: AtomicUsize::new(0),
                failures_left: Mutex::new(0),
                open_delay: Mutex::new(None),
                connections_tx,
                connections_rx: tokio::sync::Mutex::new(connections_rx),
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the next `count` opens fail.
    pub fn fail_opens(&self, count: usize) {
        *self.inner.failures_left.lock() = count;
    }

    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.inner.open_delay.lock() = delay;
    }

    /// Number of open attempts, failed ones included.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> Vec<MockConnection> {
        self.inner.history.lock().clone()
    }

    /// Wait for the next successful open.
    pub async fn next_connection(&self) -> MockConnection {
        let next = async { self.inner.connections_rx.lock().await.recv().await };
        match tokio::time::timeout(WAIT_LIMIT, next).await {
            Ok(Some(connection)) => connection,
            _ => panic!("no connection opened within {:?}", WAIT_LIMIT),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _url: &str) -> Result<TransportSession> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut failures = self.inner.failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(FabricError::Transport("connection refused".to_string()));
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connection = MockConnection {
            events: events_tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            sent_notify: Arc::new(Notify::new()),
            broken: Arc::new(AtomicBool::new(false)),
            client_close: Arc::new(Mutex::new(None)),
        };
        self.inner.history.lock().push(connection.clone());
        let _ = self.inner.connections_tx.send(connection.clone());

        Ok(TransportSession {
            sink: Box::new(MockSink {
                connection: connection.clone(),
            }),
            source: Box::new(MockSource { events: events_rx }),
        })
    }
}

/// Server side of one mock transport.
#[derive(Clone)]
pub struct MockConnection {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    sent_notify: Arc<Notify>,
    broken: Arc<AtomicBool>,
    client_close: Arc<Mutex<Option<u16>>>,
}

impl MockConnection {
    pub fn push(&self, value: Value) {
        self.push_raw(&value.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Frame(text.to_string()));
    }

    /// Close from the server side. Later client writes fail.
    pub fn close(&self, code: u16) {
        self.broken.store(true, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: "closed by server".to_string(),
        });
    }

    /// Make client writes fail without closing.
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| Envelope::from_json(frame).ok())
            .collect()
    }

    /// Close code the client sent, if it closed.
    pub fn client_close_code(&self) -> Option<u16> {
        *self.client_close.lock()
    }

    /// Wait until the client has sent an envelope matching `predicate`.
    pub async fn wait_for_sent<P: Fn(&Envelope) -> bool>(&self, predicate: P) -> Envelope {
        let wait = async {
            loop {
                let notified = self.sent_notify.notified();
                if let Some(envelope) = self.sent_envelopes().into_iter().find(|e| predicate(e)) {
                    return envelope;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(WAIT_LIMIT, wait).await {
            Ok(envelope) => envelope,
            Err(_) => panic!("expected envelope was not sent within {:?}", WAIT_LIMIT),
        }
    }
}

struct MockSink {
    connection: MockConnection,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.connection.broken.load(Ordering::SeqCst) {
            return Err(FabricError::Transport("broken pipe".to_string()));
        }
        self.connection.sent.lock().push(frame);
        self.connection.sent_notify.notify_waiters();
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        *self.connection.client_close.lock() = Some(code);
        self.connection.broken.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockSource {
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next_event(&mut self) -> TransportEvent {
        self.events.recv().await.unwrap_or(TransportEvent::Closed {
            code: CLOSE_ABNORMAL,
            reason: "server gone".to_string(),
        })
    }
}

// endregion: --- Transport

// region:    --- Probe

struct ProbeScript {
    online: bool,
    latency: Duration,
    calls: Vec<String>,
}

/// Health probe answering every URL with the same scripted outcome.
#[derive(Clone)]
pub struct MockProbe {
    script: Arc<Mutex<ProbeScript>>,
}

impl MockProbe {
    pub fn new(online: bool, latency: Duration) -> Self {
        Self {
            script: Arc::new(Mutex::new(ProbeScript {
                online,
                latency,
                calls: Vec::new(),
            })),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.script.lock().online = online;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }
}

#[async_trait]
impl HealthProbe for MockProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration> {
        let (online, latency) = {
            let mut script = self.script.lock();
            script.calls.push(url.to_string());
            (script.online, script.latency)
        };
        if !online {
            return Err(FabricError::Probe(format!("{} unreachable", url)));
        }
        if latency > timeout {
            return Err(FabricError::Timeout(timeout.as_millis() as u64));
        }
        Ok(latency)
    }
}

// endregion: --- Probe

// region:    --- Wallet provider

struct ProviderScript {
    address: String,
    accounts: Vec<String>,
    chain: Option<Chain>,
    connect_error: Option<(Option<i64>, String)>,
    switch_error: Option<(Option<i64>, String)>,
    connect_delay: Option<Duration>,
    balance: u128,
}

struct ProviderInner {
    wallet_type: WalletType,
    installed: AtomicBool,
    connect_calls: AtomicUsize,
    account_queries: AtomicUsize,
    disconnects: AtomicUsize,
    script: Mutex<ProviderScript>,
    events: EventBus<ProviderEvent>,
}

/// Wallet provider driven by the test.
#[derive(Clone)]
pub struct MockProvider {
    inner: Arc<ProviderInner>,
}

impl MockProvider {
    /// Installed provider that approves connections with `address`.
    pub fn new(wallet_type: WalletType, address: &str) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                wallet_type,
                installed: AtomicBool::new(true),
                connect_calls: AtomicUsize::new(0),
                account_queries: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                script: Mutex::new(ProviderScript {
                    address: address.to_string(),
                    accounts: Vec::new(),
                    chain: None,
                    connect_error: None,
                    switch_error: None,
                    connect_delay: None,
                    balance: 0,
                }),
                events: EventBus::new(),
            }),
        }
    }

    pub fn set_installed(&self, installed: bool) {
        self.inner.installed.store(installed, Ordering::SeqCst);
    }

    pub fn fail_connect(&self, code: Option<i64>, message: &str) {
        self.inner.script.lock().connect_error = Some((code, message.to_string()));
    }

    pub fn fail_switch(&self, code: Option<i64>, message: &str) {
        self.inner.script.lock().switch_error = Some((code, message.to_string()));
    }

    pub fn clear_failures(&self) {
        let mut script = self.inner.script.lock();
        script.connect_error = None;
        script.switch_error = None;
    }

    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.inner.script.lock().connect_delay = delay;
    }

    /// Accounts reported by `connected_accounts` (already authorized).
    pub fn set_accounts(&self, accounts: Vec<String>) {
        self.inner.script.lock().accounts = accounts;
    }

    pub fn set_balance(&self, balance: u128) {
        self.inner.script.lock().balance = balance;
    }

    pub fn current_chain(&self) -> Option<Chain> {
        self.inner.script.lock().chain
    }

    /// Push a notification to every listener.
    pub fn emit(&self, event: ProviderEvent) {
        self.inner.events.emit(&event);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.events.listener_count()
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    pub fn account_queries(&self) -> usize {
        self.inner.account_queries.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn wallet_type(&self) -> WalletType {
        self.inner.wallet_type
    }

    fn is_installed(&self) -> bool {
        self.inner.installed.load(Ordering::SeqCst)
    }

    async fn connect(&self, chain: Chain) -> Result<String> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.inner.script.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.inner.script.lock();
        if let Some((code, message)) = script.connect_error.clone() {
            return Err(FabricError::provider(code, message));
        }
        script.accounts = vec![script.address.clone()];
        script.chain = Some(chain);
        Ok(script.address.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        self.inner.script.lock().accounts.clear();
        Ok(())
    }

    async fn connected_accounts(&self) -> Result<Vec<String>> {
        self.inner.account_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.script.lock().accounts.clone())
    }

    async fn switch_chain(&self, chain: Chain) -> Result<()> {
        let mut script = self.inner.script.lock();
        if let Some((code, message)) = script.switch_error.clone() {
            return Err(FabricError::provider(code, message));
        }
        script.chain = Some(chain);
        Ok(())
    }

    async fn native_balance(&self, _address: &str, _chain: Chain) -> Result<u128> {
        Ok(self.inner.script.lock().balance)
    }

    fn subscribe(&self, listener: ProviderListener) -> Listener {
        self.inner.events.subscribe(move |event| listener(event))
    }
}

// endregion: --- Wallet provider
