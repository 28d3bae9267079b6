//! # Wallet Session Core
//!
//! Owns the authoritative wallet connection for the UI.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──address──▶ Connected
//!    ▲                    │                      │
//!    │                 failure                   ├─ disconnect / empty accounts ──▶ Idle
//!    │                    ▼                      └─ cross-family switch ──▶ Connecting
//!    └──clear_error──── Error(category)
//! ```
//!
//! Only one connect runs at a time: later callers join the in-flight attempt
//! and receive the same result. The attempt is driven by its own task, so it
//! completes (or times out) even if every caller stops waiting.
//!
//! Every connect, disconnect, restore and unmount bumps a generation counter.
//! Provider callbacks and attempts from an older generation are ignored.

use super::address::{addresses_match, validate_address};
use super::config::WalletConfig;
use super::persistence::{SavedSession, SessionPersistence};
use super::registry::{DetectedWallet, ProviderRegistry};
use super::state::{Balance, Balances, NetworkStatus, WalletEvent, WalletSession, WalletStatus};
use crate::core::error::{ErrorRecord, FabricError, Result};
use crate::core::service::{BalanceEnricher, ProviderEvent, WalletProvider};
use crate::debug::{new_trace_id, spawn_tracked, with_trace_id, ErrorAggregator, Logger};
use crate::events::{EventBus, Listener};
use crate::offline::{ConnectionQuality, OfflineEvent, OfflineFabric};
use crate::store::Store;
use crate::utils::{Debouncer, SharedClock, SystemClock};
use futures::future::{BoxFuture, FutureExt, Shared as SharedFuture};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use shared::dto::{Chain, ErrorCategory, RecoveryAction, WalletType};
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Result of a connect attempt: the connected address.
pub type ConnectOutcome = std::result::Result<String, ErrorRecord>;

type ConnectFuture = SharedFuture<BoxFuture<'static, ConnectOutcome>>;

struct Inner {
    session: WalletSession,
    provider: Option<Arc<dyn WalletProvider>>,
    provider_listener: Option<Listener>,
    generation: u64,
    in_flight: Option<ConnectFuture>,
    /// Wallet and chain of the last connect, for `retry_connection`.
    last_target: Option<(WalletType, Chain)>,
    refresh_task: Option<JoinHandle<()>>,
    restoring: bool,
}

struct Shared {
    config: WalletConfig,
    registry: ProviderRegistry,
    persistence: SessionPersistence,
    enricher: RwLock<Option<Arc<dyn BalanceEnricher>>>,
    clock: SharedClock,
    log: Logger,
    errors: ErrorAggregator,
    events: EventBus<WalletEvent>,
    status_tx: watch::Sender<WalletStatus>,
    restore: Debouncer,
    network: Mutex<Option<(OfflineFabric, Listener)>>,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().refresh_task.take() {
            task.abort();
        }
    }
}

/// Resets the restore flag when a restore ends, however it ends.
struct RestoreGuard<'a>(&'a Shared);

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.lock().restoring = false;
    }
}

/// Cheap cloneable handle to one wallet session.
#[derive(Clone)]
pub struct WalletSessionCore {
    shared: Arc<Shared>,
}

impl WalletSessionCore {
    pub fn new(config: WalletConfig, registry: ProviderRegistry, store: Arc<dyn Store>) -> Self {
        Self::with_clock(config, registry, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: WalletConfig,
        registry: ProviderRegistry,
        store: Arc<dyn Store>,
        clock: SharedClock,
    ) -> Self {
        let log = Logger::new("wallet");
        let (status_tx, _) = watch::channel(WalletStatus::Idle);
        let inner = Inner {
            session: WalletSession::new(config.default_chain),
            provider: None,
            provider_listener: None,
            generation: 0,
            in_flight: None,
            last_target: None,
            refresh_task: None,
            restoring: false,
        };
        Self {
            shared: Arc::new(Shared {
                persistence: SessionPersistence::new(store, clock.clone(), log.clone()),
                errors: ErrorAggregator::new(log.clone()),
                restore: Debouncer::new(config.restore_debounce()),
                enricher: RwLock::new(None),
                events: EventBus::new(),
                network: Mutex::new(None),
                inner: Mutex::new(inner),
                status_tx,
                log,
                clock,
                registry,
                config,
            }),
        }
    }

    /// Token balances are fetched through `enricher` on every refresh.
    pub fn set_enricher(&self, enricher: Arc<dyn BalanceEnricher>) {
        *self.shared.enricher.write() = Some(enricher);
    }

    // region:    --- Connect / disconnect

    /// Connect `wallet_type` on `chain` (or the configured default for its
    /// family). A call made while another connect is running joins it.
    pub async fn connect(&self, wallet_type: WalletType, chain: Option<Chain>) -> ConnectOutcome {
        let (future, events) = {
            let mut inner = self.shared.inner.lock();
            if let Some(in_flight) = inner.in_flight.clone() {
                self.shared
                    .log
                    .debug("Joining in-flight wallet connect")
                    .field("wallet_type", wallet_type.name())
                    .emit();
                (in_flight, Vec::new())
            } else {
                let chain = chain.unwrap_or_else(|| self.default_chain_for(wallet_type));
                inner.generation += 1;
                let generation = inner.generation;
                inner.last_target = Some((wallet_type, chain));
                inner.session.last_attempt_at = Some(self.shared.clock.now_utc());
                let events: Vec<WalletEvent> = self
                    .set_status_locked(&mut inner, WalletStatus::Connecting)
                    .into_iter()
                    .collect();

                let future = self
                    .clone()
                    .attempt_connect(generation, wallet_type, chain)
                    .boxed()
                    .shared();
                inner.in_flight = Some(future.clone());
                spawn_tracked("wallet_connect", future.clone());
                (future, events)
            }
        };
        self.shared.publish(events);
        future.await
    }

    fn default_chain_for(&self, wallet_type: WalletType) -> Chain {
        let config = &self.shared.config;
        if wallet_type.supports(config.default_chain) {
            return config.default_chain;
        }
        config
            .supported_chains
            .iter()
            .copied()
            .find(|chain| wallet_type.supports(*chain))
            .unwrap_or(config.default_chain)
    }

    async fn attempt_connect(self, generation: u64, wallet_type: WalletType, chain: Chain) -> ConnectOutcome {
        with_trace_id(new_trace_id(), async move {
            self.shared
                .log
                .info("Connecting wallet")
                .field("wallet_type", wallet_type.name())
                .field("chain", chain.as_str())
                .emit();
            let result = self.request_account(wallet_type, chain).await;
            self.finish_connect(generation, wallet_type, chain, result)
        })
        .await
    }

    async fn request_account(
        &self,
        wallet_type: WalletType,
        chain: Chain,
    ) -> Result<(Arc<dyn WalletProvider>, String)> {
        if !self.shared.config.supports(chain) {
            return Err(FabricError::Validation(format!("chain {} is not enabled", chain)));
        }
        if !wallet_type.supports(chain) {
            return Err(FabricError::Validation(format!(
                "{} cannot connect to {}",
                wallet_type, chain
            )));
        }
        let provider = self
            .shared
            .registry
            .get(wallet_type)
            .filter(|p| p.is_installed())
            .ok_or_else(|| FabricError::NotInstalled(wallet_type.name().to_string()))?;
        let address = self.with_deadline(provider.connect(chain)).await?;
        validate_address(&address, chain)?;
        Ok((provider, address))
    }

    fn finish_connect(
        &self,
        generation: u64,
        wallet_type: WalletType,
        chain: Chain,
        result: Result<(Arc<dyn WalletProvider>, String)>,
    ) -> ConnectOutcome {
        let mut events = Vec::new();
        let outcome = {
            let mut inner = self.shared.inner.lock();
            if inner.generation != generation {
                return Err(ErrorRecord::new(
                    ErrorCategory::WalletNotConnected,
                    "wallet.connect",
                    "connection attempt was cancelled",
                ));
            }
            inner.in_flight = None;
            match result {
                Ok((provider, address)) => {
                    self.release_provider_locked(&mut inner);
                    inner.provider_listener = Some(self.watch_provider(&provider, generation));
                    inner.provider = Some(provider);
                    inner.session.address = Some(address.clone());
                    inner.session.wallet_type = Some(wallet_type);
                    inner.session.chain = chain;
                    inner.session.retry_count = 0;
                    events.extend(self.set_status_locked(&mut inner, WalletStatus::Connected));
                    events.push(WalletEvent::Connected {
                        address: address.clone(),
                        wallet_type,
                        chain,
                    });
                    self.persist_locked(&inner);
                    self.start_refresh_locked(&mut inner);
                    Ok(address)
                }
                Err(e) => {
                    let record = ErrorRecord::from_error(&e, "wallet.connect").with_context(
                        json!({ "walletType": wallet_type, "chain": chain }),
                    );
                    inner.session.retry_count += 1;
                    inner.session.push_error(record.clone());
                    events.extend(
                        self.set_status_locked(&mut inner, WalletStatus::Error(record.category)),
                    );
                    events.push(WalletEvent::Error(record.clone()));
                    Err(record)
                }
            }
        };

        match &outcome {
            Ok(address) => self
                .shared
                .log
                .info("Wallet connected")
                .field("wallet_type", wallet_type.name())
                .field("chain", chain.as_str())
                .field("address", shared::utils::format_address(address))
                .emit(),
            Err(record) => self.shared.errors.record(record.clone()),
        }
        self.shared.publish(events);
        outcome
    }

    /// Drop the connection, its listeners and refresh loop, and the persisted
    /// session. A running connect is abandoned.
    pub async fn disconnect(&self) {
        let (provider, events) = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.in_flight = None;
            inner.last_target = None;
            let provider = self.release_provider_locked(&mut inner);
            self.shared.persistence.clear();

            let mut events: Vec<WalletEvent> = self
                .set_status_locked(&mut inner, WalletStatus::Idle)
                .into_iter()
                .collect();
            let chain = inner.session.chain;
            let network_status = inner.session.network_status;
            inner.session = WalletSession::new(chain);
            inner.session.network_status = network_status;
            if provider.is_some() {
                events.push(WalletEvent::Disconnected);
            }
            (provider, events)
        };
        self.shared.publish(events);
        self.shared.log.info("Wallet disconnected").emit();

        if let Some(provider) = provider {
            if let Err(e) = self.with_deadline(provider.disconnect()).await {
                self.shared
                    .log
                    .warn("Provider disconnect failed")
                    .field("error", e.to_string())
                    .emit();
            }
        }
    }

    /// Retry the last connect, unless the retry budget is spent.
    pub async fn retry_connection(&self) -> ConnectOutcome {
        let (target, allowed) = {
            let inner = self.shared.inner.lock();
            (inner.last_target, self.can_retry_locked(&inner))
        };
        let Some((wallet_type, chain)) = target else {
            return Err(ErrorRecord::from_error(
                &FabricError::NotConnected("no previous connection attempt".to_string()),
                "wallet.retry_connection",
            ));
        };
        if !allowed {
            return Err(ErrorRecord::new(
                ErrorCategory::Unknown,
                "wallet.retry_connection",
                "retry limit reached",
            )
            .with_recovery(RecoveryAction::ContactSupport));
        }
        self.connect(wallet_type, Some(chain)).await
    }

    /// Reset the retry budget and error history, leaving `Error` for `Idle`.
    pub fn clear_error(&self) {
        let events = {
            let mut inner = self.shared.inner.lock();
            inner.session.retry_count = 0;
            inner.session.error_history.clear();
            if inner.session.status.is_error() {
                self.set_status_locked(&mut inner, WalletStatus::Idle)
            } else {
                None
            }
        };
        self.shared.publish(events.into_iter().collect());
    }

    pub fn can_retry(&self) -> bool {
        self.can_retry_locked(&self.shared.inner.lock())
    }

    fn can_retry_locked(&self, inner: &Inner) -> bool {
        inner.session.retry_count < self.shared.config.max_retry_count
            && inner.session.status != WalletStatus::Connecting
    }

    // endregion: --- Connect / disconnect

    // region:    --- Chain switching

    /// Switch to `chain`. Within a protocol family the provider switches;
    /// across families the wallet is disconnected and the first installed
    /// wallet of the target family is connected instead.
    pub async fn switch_chain(&self, chain: Chain) -> std::result::Result<(), ErrorRecord> {
        with_trace_id(new_trace_id(), self.switch_chain_traced(chain)).await
    }

    async fn switch_chain_traced(&self, chain: Chain) -> std::result::Result<(), ErrorRecord> {
        let current = {
            let inner = self.shared.inner.lock();
            match (&inner.provider, inner.session.wallet_type, inner.session.status) {
                (Some(provider), Some(wallet_type), WalletStatus::Connected) => Some((
                    provider.clone(),
                    wallet_type,
                    inner.session.chain,
                    inner.generation,
                )),
                _ => None,
            }
        };
        let Some((provider, wallet_type, previous, generation)) = current else {
            return Err(self.fail_operation(
                FabricError::NotConnected("switching chains requires a connected wallet".to_string()),
                "wallet.switch_chain",
                chain,
            ));
        };
        if chain == previous {
            return Ok(());
        }
        if !self.shared.config.supports(chain) {
            return Err(self.fail_operation(
                FabricError::Validation(format!("chain {} is not enabled", chain)),
                "wallet.switch_chain",
                chain,
            ));
        }

        if wallet_type.supports(chain) {
            if let Err(e) = self.with_deadline(provider.switch_chain(chain)).await {
                return Err(self.fail_operation(e, "wallet.switch_chain", chain));
            }
            let applied = {
                let mut inner = self.shared.inner.lock();
                if inner.generation == generation {
                    inner.session.chain = chain;
                    inner.session.balances = Balances::default();
                    self.persist_locked(&inner);
                    true
                } else {
                    false
                }
            };
            if applied {
                self.shared
                    .log
                    .info("Chain switched")
                    .field("chain", chain.as_str())
                    .field("previous", previous.as_str())
                    .emit();
                self.shared
                    .publish(vec![WalletEvent::ChainChanged { chain, previous }]);
                self.spawn_refresh();
            }
            return Ok(());
        }

        let Some(target) = self.shared.registry.first_installed_for(chain.family()) else {
            return Err(self.fail_operation(
                FabricError::NotInstalled(format!("no {} wallet installed", chain.family())),
                "wallet.switch_chain",
                chain,
            ));
        };
        self.shared
            .log
            .info("Switching wallet protocol")
            .field("from", wallet_type.name())
            .field("to", target.wallet_type().name())
            .field("chain", chain.as_str())
            .emit();

        let (old, events) = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.in_flight = None;
            let old = self.release_provider_locked(&mut inner);
            self.shared.persistence.clear();
            let events: Vec<WalletEvent> = self
                .set_status_locked(&mut inner, WalletStatus::Connecting)
                .into_iter()
                .collect();
            (old, events)
        };
        self.shared.publish(events);
        if let Some(old) = old {
            if let Err(e) = self.with_deadline(old.disconnect()).await {
                self.shared
                    .log
                    .warn("Provider disconnect failed")
                    .field("error", e.to_string())
                    .emit();
            }
        }
        self.connect(target.wallet_type(), Some(chain)).await.map(|_| ())
    }

    /// Record a failed operation that leaves the connection as it is.
    fn fail_operation(&self, err: FabricError, operation: &str, chain: Chain) -> ErrorRecord {
        let record = ErrorRecord::from_error(&err, operation)
            .with_context(json!({ "targetChain": chain }));
        self.shared.inner.lock().session.push_error(record.clone());
        self.shared.errors.record(record.clone());
        self.shared.publish(vec![WalletEvent::Error(record.clone())]);
        record
    }

    // endregion: --- Chain switching

    // region:    --- Balances

    /// Fetch the native balance and, with an enricher, token balances.
    /// Failures are logged and leave the connection untouched. While the
    /// attached network is offline the last known balances are returned.
    pub async fn refresh_balances(&self) -> std::result::Result<Balances, ErrorRecord> {
        let target = {
            let inner = self.shared.inner.lock();
            match (&inner.provider, &inner.session.address, inner.session.status) {
                (Some(provider), Some(address), WalletStatus::Connected) => Some((
                    provider.clone(),
                    address.clone(),
                    inner.session.chain,
                    inner.generation,
                )),
                _ => None,
            }
        };
        let Some((provider, address, chain, generation)) = target else {
            return Err(ErrorRecord::from_error(
                &FabricError::NotConnected("no connected wallet".to_string()),
                "wallet.refresh_balances",
            ));
        };
        if self.is_network_offline() {
            self.shared
                .log
                .debug("Offline, skipping balance refresh")
                .emit();
            return Ok(self.balances());
        }

        let raw = match self.with_deadline(provider.native_balance(&address, chain)).await {
            Ok(raw) => raw,
            Err(e) => {
                let record = ErrorRecord::from_error(&e, "wallet.refresh_balances")
                    .with_context(json!({ "chain": chain }));
                self.shared
                    .log
                    .warn("Balance refresh failed")
                    .correlation(&record.id)
                    .field("category", record.category.as_str())
                    .field("error", record.original_error.as_str())
                    .emit();
                return Err(record);
            }
        };

        let enricher = self.shared.enricher.read().clone();
        let tokens = match enricher {
            Some(enricher) => match self.with_deadline(enricher.token_balances(&address, chain)).await {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    self.shared
                        .log
                        .warn("Token balance enrichment failed")
                        .field("error", e.to_string())
                        .emit();
                    None
                }
            },
            None => Some(Vec::new()),
        };

        let balances = {
            let mut inner = self.shared.inner.lock();
            let unchanged = inner.generation == generation
                && inner
                    .session
                    .address
                    .as_deref()
                    .is_some_and(|current| addresses_match(current, &address, chain))
                && inner.session.chain == chain;
            if !unchanged {
                return Ok(inner.session.balances.clone());
            }
            let tokens = tokens.unwrap_or_else(|| inner.session.balances.tokens.clone());
            inner.session.balances = Balances {
                native: Some(Balance::native(chain, raw)),
                tokens,
                updated_at: Some(self.shared.clock.now_utc()),
            };
            inner.session.balances.clone()
        };
        self.shared
            .log
            .debug("Balances refreshed")
            .field("chain", chain.as_str())
            .field("native", raw.to_string())
            .field("tokens", balances.tokens.len())
            .emit();
        self.shared
            .publish(vec![WalletEvent::BalancesUpdated(balances.clone())]);
        Ok(balances)
    }

    /// Refresh now, then every `balanceRefreshMs` while connected.
    fn start_refresh_locked(&self, inner: &mut Inner) {
        if let Some(task) = inner.refresh_task.take() {
            task.abort();
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let interval = self.shared.config.balance_refresh_interval();
        inner.refresh_task = Some(spawn_tracked("wallet_balance_refresh", async move {
            loop {
                let Some(shared) = weak.upgrade() else { break };
                let core = WalletSessionCore { shared };
                if core.status() != WalletStatus::Connected {
                    core.shared.log.debug("Balance refresh loop stopped").emit();
                    break;
                }
                let _ = core.refresh_balances().await;
                drop(core);
                tokio::time::sleep(interval).await;
            }
        }));
    }

    fn spawn_refresh(&self) {
        let core = self.clone();
        spawn_tracked("wallet_balance_refresh_once", async move {
            let _ = core.refresh_balances().await;
        });
    }

    // endregion: --- Balances

    // region:    --- Restore

    /// Schedule a restore of the persisted session. Repeated calls within
    /// the debounce window collapse into one.
    pub fn mount(&self) {
        if !self.shared.config.auto_connect {
            self.shared
                .log
                .debug("Auto-connect disabled, not restoring")
                .emit();
            return;
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.restore.call(async move {
            if let Some(shared) = weak.upgrade() {
                WalletSessionCore { shared }.restore_session().await;
            }
        });
    }

    /// Resume the persisted session if its provider still authorizes the
    /// saved address; otherwise forget it. Returns the restored address.
    pub async fn restore_session(&self) -> Option<String> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.restoring
                || matches!(
                    inner.session.status,
                    WalletStatus::Connecting | WalletStatus::Connected
                )
            {
                self.shared
                    .log
                    .debug("Restore skipped")
                    .field("status", inner.session.status.as_str())
                    .field("restoring", inner.restoring)
                    .emit();
                return None;
            }
            inner.restoring = true;
        }
        let _restoring = RestoreGuard(&self.shared);
        with_trace_id(new_trace_id(), self.restore_traced()).await
    }

    async fn restore_traced(&self) -> Option<String> {
        let saved = self.shared.persistence.load()?;
        let Some(provider) = self
            .shared
            .registry
            .get(saved.wallet_type)
            .filter(|p| p.is_installed())
        else {
            self.forget_saved(&saved, "wallet not available");
            return None;
        };

        let accounts = match self.with_deadline(provider.connected_accounts()).await {
            Ok(accounts) => accounts,
            Err(e) => {
                self.shared
                    .log
                    .warn("Could not confirm saved wallet session")
                    .field("error", e.to_string())
                    .emit();
                self.forget_saved(&saved, "provider check failed");
                return None;
            }
        };
        if !accounts
            .iter()
            .any(|account| addresses_match(account, &saved.address, saved.chain))
        {
            self.forget_saved(&saved, "address no longer authorized");
            return None;
        }

        let events = {
            let mut inner = self.shared.inner.lock();
            if matches!(
                inner.session.status,
                WalletStatus::Connecting | WalletStatus::Connected
            ) {
                return None;
            }
            inner.generation += 1;
            let generation = inner.generation;
            self.release_provider_locked(&mut inner);
            inner.provider_listener = Some(self.watch_provider(&provider, generation));
            inner.provider = Some(provider);
            inner.last_target = Some((saved.wallet_type, saved.chain));
            inner.session.address = Some(saved.address.clone());
            inner.session.wallet_type = Some(saved.wallet_type);
            inner.session.chain = saved.chain;
            inner.session.retry_count = 0;

            let mut events: Vec<WalletEvent> = self
                .set_status_locked(&mut inner, WalletStatus::Connected)
                .into_iter()
                .collect();
            events.push(WalletEvent::Restored {
                address: saved.address.clone(),
                wallet_type: saved.wallet_type,
                chain: saved.chain,
            });
            self.persist_locked(&inner);
            self.start_refresh_locked(&mut inner);
            events
        };
        self.shared
            .log
            .info("Wallet session restored")
            .field("wallet_type", saved.wallet_type.name())
            .field("chain", saved.chain.as_str())
            .field("address", shared::utils::format_address(&saved.address))
            .emit();
        self.shared.publish(events);
        Some(saved.address)
    }

    fn forget_saved(&self, saved: &SavedSession, reason: &str) {
        self.shared
            .log
            .info("Clearing saved wallet session")
            .field("wallet_type", saved.wallet_type.name())
            .field(
                "saved_at",
                lib_utils::millis_to_utc(saved.saved_at).map(lib_utils::format_time),
            )
            .field("reason", reason)
            .emit();
        self.shared.persistence.clear();
    }

    /// Component tear-down: cancel timers, listeners and any running connect.
    /// The persisted session is left in place for the next mount.
    pub fn unmount(&self) {
        self.shared.restore.cancel();
        let events = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.in_flight = None;
            inner.restoring = false;
            if let Some(task) = inner.refresh_task.take() {
                task.abort();
            }
            if let Some(listener) = inner.provider_listener.take() {
                listener.cancel();
            }
            inner.provider = None;
            let events = self.set_status_locked(&mut inner, WalletStatus::Idle);
            let chain = inner.session.chain;
            inner.session = WalletSession::new(chain);
            events
        };
        let network = self.shared.network.lock().take();
        if let Some((_, listener)) = network {
            listener.cancel();
        }
        self.shared.log.debug("Wallet session unmounted").emit();
        self.shared.publish(events.into_iter().collect());
    }

    pub fn is_restoring(&self) -> bool {
        self.shared.inner.lock().restoring || self.shared.restore.is_pending()
    }

    // endregion: --- Restore

    // region:    --- Network

    /// Mirror the fabric's connectivity into `networkStatus` and skip
    /// balance refreshes while it reports offline.
    pub fn attach_network(&self, fabric: &OfflineFabric) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let listener = fabric.subscribe(move |event| {
            let Some(shared) = weak.upgrade() else { return };
            let core = WalletSessionCore { shared };
            core.sync_network_status();
            if matches!(event, OfflineEvent::Online(_)) && core.is_connected() {
                core.spawn_refresh();
            }
        });
        let previous = self
            .shared
            .network
            .lock()
            .replace((fabric.clone(), listener));
        if let Some((_, previous)) = previous {
            previous.cancel();
        }
        self.sync_network_status();
    }

    fn sync_network_status(&self) {
        let state = match self.shared.network.lock().as_ref() {
            Some((fabric, _)) => fabric.network_state(),
            None => return,
        };
        let status = if !state.is_online {
            NetworkStatus::Offline
        } else if matches!(
            state.connection_quality,
            ConnectionQuality::Slow | ConnectionQuality::Poor
        ) {
            NetworkStatus::Slow
        } else {
            NetworkStatus::Online
        };

        let changed = {
            let mut inner = self.shared.inner.lock();
            let changed = inner.session.network_status != status;
            inner.session.network_status = status;
            changed
        };
        if changed {
            self.shared
                .log
                .debug("Network status changed")
                .field("network_status", format!("{:?}", status).to_lowercase())
                .emit();
            self.shared.publish(vec![WalletEvent::NetworkChanged(status)]);
        }
    }

    fn is_network_offline(&self) -> bool {
        self.shared
            .network
            .lock()
            .as_ref()
            .is_some_and(|(fabric, _)| !fabric.is_online())
    }

    // endregion: --- Network

    // region:    --- Provider events

    fn watch_provider(&self, provider: &Arc<dyn WalletProvider>, generation: u64) -> Listener {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        provider.subscribe(Arc::new(move |event: &ProviderEvent| {
            if let Some(shared) = weak.upgrade() {
                WalletSessionCore { shared }.on_provider_event(generation, event);
            }
        }))
    }

    fn on_provider_event(&self, generation: u64, event: &ProviderEvent) {
        let mut events = Vec::new();
        let mut refresh = false;
        {
            let mut inner = self.shared.inner.lock();
            if inner.generation != generation || inner.session.status != WalletStatus::Connected {
                return;
            }
            match event {
                ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                    None => {
                        self.shared
                            .log
                            .info("Provider reports no accounts, ending session")
                            .emit();
                        self.end_session_locked(&mut inner, &mut events);
                    }
                    Some(next) => {
                        let chain = inner.session.chain;
                        let same = inner
                            .session
                            .address
                            .as_deref()
                            .is_some_and(|current| addresses_match(current, next, chain));
                        if same {
                            // reordering only
                        } else if validate_address(next, chain).is_ok() {
                            inner.session.address = Some(next.clone());
                            inner.session.balances = Balances::default();
                            self.persist_locked(&inner);
                            events.push(WalletEvent::AccountChanged {
                                address: next.clone(),
                            });
                            refresh = true;
                        } else {
                            self.shared
                                .log
                                .warn("Ignoring invalid account from provider")
                                .field("address", shared::utils::format_address(next))
                                .emit();
                        }
                    }
                },
                ProviderEvent::ChainChanged(raw) => match raw.parse::<Chain>() {
                    Ok(chain) if chain != inner.session.chain => {
                        let previous = inner.session.chain;
                        inner.session.chain = chain;
                        inner.session.balances = Balances::default();
                        self.persist_locked(&inner);
                        events.push(WalletEvent::ChainChanged { chain, previous });
                        refresh = true;
                    }
                    Ok(_) => {}
                    Err(e) => self
                        .shared
                        .log
                        .warn("Provider switched to an unsupported chain")
                        .field("error", e)
                        .emit(),
                },
                ProviderEvent::Disconnected => {
                    self.shared.log.info("Provider disconnected").emit();
                    self.end_session_locked(&mut inner, &mut events);
                }
            }
        }
        self.shared.publish(events);
        if refresh {
            self.spawn_refresh();
        }
    }

    fn end_session_locked(&self, inner: &mut Inner, events: &mut Vec<WalletEvent>) {
        inner.generation += 1;
        inner.in_flight = None;
        self.release_provider_locked(inner);
        self.shared.persistence.clear();
        events.extend(self.set_status_locked(inner, WalletStatus::Idle));
        events.push(WalletEvent::Disconnected);
    }

    // endregion: --- Provider events

    // region:    --- Helpers

    /// Stop the refresh loop and provider listener and forget the address.
    fn release_provider_locked(&self, inner: &mut Inner) -> Option<Arc<dyn WalletProvider>> {
        if let Some(task) = inner.refresh_task.take() {
            task.abort();
        }
        if let Some(listener) = inner.provider_listener.take() {
            listener.cancel();
        }
        inner.session.clear_connection();
        inner.provider.take()
    }

    fn set_status_locked(&self, inner: &mut Inner, status: WalletStatus) -> Option<WalletEvent> {
        let previous = inner.session.status;
        if previous == status {
            return None;
        }
        inner.session.status = status;
        self.shared.status_tx.send_replace(status);
        self.shared
            .log
            .debug("Wallet status changed")
            .field("status", status.to_string())
            .field("previous", previous.to_string())
            .emit();
        Some(WalletEvent::StatusChanged { status, previous })
    }

    fn persist_locked(&self, inner: &Inner) {
        if !self.shared.config.persist_connection {
            return;
        }
        let (Some(address), Some(wallet_type)) = (&inner.session.address, inner.session.wallet_type)
        else {
            return;
        };
        if let Err(e) = self
            .shared
            .persistence
            .save(address, wallet_type, inner.session.chain)
        {
            self.shared
                .log
                .warn("Failed to persist wallet session")
                .field("error", e.to_string())
                .emit();
        }
    }

    async fn with_deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let budget = self.shared.config.connect_timeout();
        match tokio::time::timeout(budget, operation).await {
            Ok(result) => result,
            Err(_) => Err(FabricError::Timeout(budget.as_millis() as u64)),
        }
    }

    // endregion: --- Helpers

    // region:    --- Observers

    pub fn subscribe<F>(&self, callback: F) -> Listener
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    pub fn session(&self) -> WalletSession {
        self.shared.inner.lock().session.clone()
    }

    pub fn status(&self) -> WalletStatus {
        self.shared.inner.lock().session.status
    }

    pub fn watch_status(&self) -> watch::Receiver<WalletStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == WalletStatus::Connected
    }

    pub fn address(&self) -> Option<String> {
        self.shared.inner.lock().session.address.clone()
    }

    pub fn chain(&self) -> Chain {
        self.shared.inner.lock().session.chain
    }

    pub fn wallet_type(&self) -> Option<WalletType> {
        self.shared.inner.lock().session.wallet_type
    }

    pub fn balances(&self) -> Balances {
        self.shared.inner.lock().session.balances.clone()
    }

    pub fn detect_wallets(&self) -> Vec<DetectedWallet> {
        self.shared.registry.detect_wallets()
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.shared.errors.recent()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &WalletConfig {
        &self.shared.config
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.log
    }

    // endregion: --- Observers
}

impl Shared {
    fn publish(&self, events: Vec<WalletEvent>) {
        for event in &events {
            self.events.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::OfflineConfig;
    use crate::store::MemoryStore;
    use crate::testing::{eventually, MockProbe, MockProvider};
    use crate::utils::ManualClock;
    use crate::wallet::persistence::WALLET_SESSION_KEY;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;

    const EVM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const OTHER_EVM: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";
    const SOL: &str = "8W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAL";

    struct Harness {
        core: WalletSessionCore,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        metamask: MockProvider,
        phantom: MockProvider,
        events: Arc<Mutex<Vec<WalletEvent>>>,
        _listener: Listener,
    }

    impl Harness {
        fn events(&self) -> Vec<WalletEvent> {
            self.events.lock().clone()
        }

        fn persistence(&self) -> SessionPersistence {
            SessionPersistence::new(self.store.clone(), self.clock.clone(), Logger::new("wallet"))
        }
    }

    fn harness(config: WalletConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let metamask = MockProvider::new(WalletType::Metamask, EVM);
        let phantom = MockProvider::new(WalletType::Phantom, SOL);
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(metamask.clone()));
        registry.register(Arc::new(phantom.clone()));

        let core = WalletSessionCore::with_clock(config, registry, store.clone(), clock.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener = core.subscribe(move |event| sink.lock().push(event.clone()));
        Harness {
            core,
            store,
            clock,
            metamask,
            phantom,
            events,
            _listener: listener,
        }
    }

    #[tokio::test]
    async fn test_connect_persists_session() {
        let h = harness(WalletConfig::default());
        let address = h.core.connect(WalletType::Metamask, None).await.unwrap();

        assert_eq!(address, EVM);
        assert!(h.core.is_connected());
        assert_eq!(h.core.chain(), Chain::Ethereum);
        assert_eq!(h.metamask.current_chain(), Some(Chain::Ethereum));
        assert_eq!(h.metamask.listener_count(), 1);

        let saved = h.persistence().load().unwrap();
        assert_eq!(saved.address, EVM);
        assert_eq!(saved.wallet_type, WalletType::Metamask);

        let events = h.events();
        assert!(events.contains(&WalletEvent::StatusChanged {
            status: WalletStatus::Connecting,
            previous: WalletStatus::Idle,
        }));
        assert!(events.contains(&WalletEvent::Connected {
            address: EVM.to_string(),
            wallet_type: WalletType::Metamask,
            chain: Chain::Ethereum,
        }));
    }

    #[tokio::test]
    async fn test_default_chain_follows_wallet_family() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Phantom, None).await.unwrap();
        assert_eq!(h.core.chain(), Chain::Solana);
        assert_eq!(h.core.address().as_deref(), Some(SOL));
    }

    #[tokio::test]
    async fn test_connect_without_persistence() {
        let h = harness(WalletConfig {
            persist_connection: false,
            ..WalletConfig::default()
        });
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        assert!(!h.store.contains(WALLET_SESSION_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connects_share_one_attempt() {
        let h = harness(WalletConfig::default());
        h.metamask.set_connect_delay(Some(Duration::from_millis(200)));

        let (a, b) = tokio::join!(
            h.core.connect(WalletType::Metamask, None),
            h.core.connect(WalletType::Metamask, None)
        );
        assert_eq!(a.unwrap(), EVM);
        assert_eq!(b.unwrap(), EVM);
        assert_eq!(h.metamask.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out() {
        let h = harness(WalletConfig {
            connect_timeout_ms: 1_000,
            ..WalletConfig::default()
        });
        h.metamask.set_connect_delay(Some(Duration::from_secs(5)));

        let err = h.core.connect(WalletType::Metamask, None).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Timeout);
        assert_eq!(h.core.status(), WalletStatus::Error(ErrorCategory::Timeout));
        assert_eq!(h.core.session().retry_count, 1);
    }

    #[tokio::test]
    async fn test_user_rejection_is_classified() {
        let h = harness(WalletConfig::default());
        h.metamask.fail_connect(Some(4001), "User rejected the request");

        let err = h.core.connect(WalletType::Metamask, None).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::UserRejected);
        assert_eq!(err.operation, "wallet.connect");
        assert_eq!(err.context["walletType"], "metamask");

        let session = h.core.session();
        assert_eq!(session.status, WalletStatus::Error(ErrorCategory::UserRejected));
        assert_eq!(session.error_history.len(), 1);
        assert_eq!(h.core.recent_errors().len(), 1);
        assert!(h.events().contains(&WalletEvent::Error(err)));
        assert!(!h.store.contains(WALLET_SESSION_KEY));
    }

    #[tokio::test]
    async fn test_missing_wallet_is_not_installed() {
        let h = harness(WalletConfig::default());
        h.metamask.set_installed(false);

        let err = h.core.connect(WalletType::Metamask, None).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::WalletNotInstalled);
        assert_eq!(err.recovery_action, RecoveryAction::InstallWallet);
        assert_eq!(h.metamask.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_chain_is_rejected() {
        let h = harness(WalletConfig {
            supported_chains: vec![Chain::Ethereum],
            ..WalletConfig::default()
        });
        let err = h
            .core
            .connect(WalletType::Metamask, Some(Chain::Polygon))
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(h.metamask.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_and_clear_error() {
        let h = harness(WalletConfig {
            max_retry_count: 2,
            ..WalletConfig::default()
        });
        h.metamask.fail_connect(None, "Request failed");

        assert!(h.core.retry_connection().await.is_err());
        assert!(h.core.connect(WalletType::Metamask, None).await.is_err());
        assert!(h.core.can_retry());
        assert!(h.core.retry_connection().await.is_err());
        assert!(!h.core.can_retry());

        let err = h.core.retry_connection().await.unwrap_err();
        assert_eq!(err.original_error, "retry limit reached");
        assert_eq!(err.recovery_action, RecoveryAction::ContactSupport);
        assert_eq!(h.metamask.connect_calls(), 2);

        h.core.clear_error();
        assert_eq!(h.core.status(), WalletStatus::Idle);
        assert!(h.core.session().error_history.is_empty());
        assert!(h.core.can_retry());

        h.metamask.clear_failures();
        assert_eq!(h.core.retry_connection().await.unwrap(), EVM);
    }

    #[tokio::test]
    async fn test_empty_accounts_end_session() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        h.metamask.emit(ProviderEvent::AccountsChanged(Vec::new()));
        assert_eq!(h.core.status(), WalletStatus::Idle);
        assert_eq!(h.core.address(), None);
        assert!(!h.store.contains(WALLET_SESSION_KEY));
        assert_eq!(h.metamask.listener_count(), 0);
        assert!(h.events().contains(&WalletEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_account_change_updates_session() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        h.metamask
            .emit(ProviderEvent::AccountsChanged(vec![EVM.to_lowercase()]));
        assert_eq!(h.core.address().as_deref(), Some(EVM));

        h.metamask
            .emit(ProviderEvent::AccountsChanged(vec![OTHER_EVM.to_string()]));
        assert_eq!(h.core.address().as_deref(), Some(OTHER_EVM));
        assert_eq!(h.persistence().load().unwrap().address, OTHER_EVM);
        assert!(h.events().contains(&WalletEvent::AccountChanged {
            address: OTHER_EVM.to_string()
        }));
    }

    #[tokio::test]
    async fn test_provider_chain_change() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        h.metamask.emit(ProviderEvent::ChainChanged("0x89".to_string()));
        assert_eq!(h.core.chain(), Chain::Polygon);
        assert_eq!(h.persistence().load().unwrap().chain, Chain::Polygon);

        h.metamask.emit(ProviderEvent::ChainChanged("0x999".to_string()));
        assert_eq!(h.core.chain(), Chain::Polygon);
        assert!(h.core.is_connected());
    }

    #[tokio::test]
    async fn test_stale_listener_is_ignored() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        h.core.disconnect().await;
        h.core.connect(WalletType::Phantom, None).await.unwrap();

        h.metamask.emit(ProviderEvent::Disconnected);
        assert!(h.core.is_connected());
        assert_eq!(h.core.wallet_type(), Some(WalletType::Phantom));
    }

    #[tokio::test]
    async fn test_switch_within_family() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        h.core.switch_chain(Chain::Base).await.unwrap();
        assert_eq!(h.core.chain(), Chain::Base);
        assert_eq!(h.metamask.current_chain(), Some(Chain::Base));
        assert_eq!(h.persistence().load().unwrap().chain, Chain::Base);
        assert!(h.events().contains(&WalletEvent::ChainChanged {
            chain: Chain::Base,
            previous: Chain::Ethereum,
        }));

        h.core.switch_chain(Chain::Base).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_switch_keeps_connection() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        h.metamask.fail_switch(Some(4001), "User rejected the request");

        let err = h.core.switch_chain(Chain::Arbitrum).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::UserRejected);
        assert_eq!(h.core.status(), WalletStatus::Connected);
        assert_eq!(h.core.chain(), Chain::Ethereum);
        assert_eq!(h.core.session().error_history.len(), 1);
    }

    #[tokio::test]
    async fn test_switch_across_families() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        h.core.switch_chain(Chain::Solana).await.unwrap();
        assert_eq!(h.core.wallet_type(), Some(WalletType::Phantom));
        assert_eq!(h.core.address().as_deref(), Some(SOL));
        assert_eq!(h.core.chain(), Chain::Solana);
        assert_eq!(h.metamask.disconnects(), 1);
        assert_eq!(h.metamask.listener_count(), 0);
        assert_eq!(h.phantom.listener_count(), 1);
        assert_eq!(h.persistence().load().unwrap().wallet_type, WalletType::Phantom);
    }

    #[tokio::test]
    async fn test_switch_across_families_without_wallet() {
        let h = harness(WalletConfig::default());
        h.phantom.set_installed(false);
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        let err = h.core.switch_chain(Chain::Solana).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::WalletNotInstalled);
        assert!(h.core.is_connected());
        assert_eq!(h.core.wallet_type(), Some(WalletType::Metamask));
    }

    #[tokio::test]
    async fn test_switch_requires_connection() {
        let h = harness(WalletConfig::default());
        let err = h.core.switch_chain(Chain::Base).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::WalletNotConnected);
        assert_eq!(h.core.status(), WalletStatus::Idle);
    }

    #[tokio::test]
    async fn test_refresh_balances() {
        let h = harness(WalletConfig::default());
        h.metamask.set_balance(1_500_000_000_000_000_000);
        h.core.connect(WalletType::Metamask, None).await.unwrap();

        let balances = h.core.refresh_balances().await.unwrap();
        let native = balances.native.unwrap();
        assert_eq!(native.ui_amount(), 1.5);
        assert_eq!(native.symbol(), "ETH");
        assert!(balances.updated_at.is_some());
        assert!(h
            .events()
            .iter()
            .any(|e| matches!(e, WalletEvent::BalancesUpdated(_))));
    }

    #[tokio::test]
    async fn test_refresh_requires_connection() {
        let h = harness(WalletConfig::default());
        let err = h.core.refresh_balances().await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::WalletNotConnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_network_skips_refresh() {
        let h = harness(WalletConfig::default());
        let probe = Arc::new(MockProbe::new(false, Duration::from_millis(50)));
        let network = OfflineFabric::new(
            OfflineConfig {
                health_check_urls: vec!["http://health.test/api/health".to_string()],
                ..OfflineConfig::default()
            },
            probe,
            Arc::new(MemoryStore::new()),
        );
        h.core.attach_network(&network);
        network.check_connection().await;
        assert_eq!(h.core.session().network_status, NetworkStatus::Offline);
        assert!(h
            .events()
            .contains(&WalletEvent::NetworkChanged(NetworkStatus::Offline)));

        h.metamask.set_balance(7);
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        let balances = h.core.refresh_balances().await.unwrap();
        assert_eq!(balances.native, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_mount_restores_once() {
        let h = harness(WalletConfig::default());
        h.persistence()
            .save(EVM, WalletType::Metamask, Chain::Base)
            .unwrap();
        h.metamask.set_accounts(vec![EVM.to_string()]);

        h.core.mount();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.core.mount();
        assert!(h.core.is_restoring());

        eventually(|| h.core.is_connected()).await;
        assert_eq!(h.metamask.account_queries(), 1);
        assert_eq!(h.metamask.connect_calls(), 0);
        assert_eq!(h.core.chain(), Chain::Base);
        let restored = h
            .events()
            .iter()
            .filter(|e| matches!(e, WalletEvent::Restored { .. }))
            .count();
        assert_eq!(restored, 1);
    }

    #[tokio::test]
    async fn test_restore_drops_unauthorized_session() {
        let h = harness(WalletConfig::default());
        h.persistence()
            .save(EVM, WalletType::Metamask, Chain::Ethereum)
            .unwrap();
        h.metamask.set_accounts(vec![OTHER_EVM.to_string()]);

        assert_eq!(h.core.restore_session().await, None);
        assert!(!h.store.contains(WALLET_SESSION_KEY));
        assert_eq!(h.core.status(), WalletStatus::Idle);
    }

    #[tokio::test]
    async fn test_restore_ignores_expired_session() {
        let h = harness(WalletConfig::default());
        h.persistence()
            .save(EVM, WalletType::Metamask, Chain::Ethereum)
            .unwrap();
        h.metamask.set_accounts(vec![EVM.to_string()]);
        h.clock.advance(ChronoDuration::days(8));

        assert_eq!(h.core.restore_session().await, None);
        assert_eq!(h.metamask.account_queries(), 0);
        assert!(!h.store.contains(WALLET_SESSION_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_without_auto_connect() {
        let h = harness(WalletConfig {
            auto_connect: false,
            ..WalletConfig::default()
        });
        h.persistence()
            .save(EVM, WalletType::Metamask, Chain::Ethereum)
            .unwrap();
        h.core.mount();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.metamask.account_queries(), 0);
        assert_eq!(h.core.status(), WalletStatus::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_clears_everything() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        h.core.disconnect().await;

        assert_eq!(h.core.status(), WalletStatus::Idle);
        assert_eq!(h.core.address(), None);
        assert!(!h.store.contains(WALLET_SESSION_KEY));
        assert_eq!(h.metamask.disconnects(), 1);
        assert_eq!(h.metamask.listener_count(), 0);
        assert!(h.events().contains(&WalletEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_abandons_pending_connect() {
        let h = harness(WalletConfig::default());
        h.metamask.set_connect_delay(Some(Duration::from_secs(1)));

        let core = h.core.clone();
        let pending = tokio::spawn(async move { core.connect(WalletType::Metamask, None).await });
        eventually(|| h.core.status() == WalletStatus::Connecting).await;
        h.core.disconnect().await;

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.category, ErrorCategory::WalletNotConnected);
        assert_eq!(h.core.status(), WalletStatus::Idle);
        assert!(!h.store.contains(WALLET_SESSION_KEY));
    }

    #[tokio::test]
    async fn test_unmount_keeps_durable_session() {
        let h = harness(WalletConfig::default());
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        h.core.unmount();

        assert_eq!(h.core.status(), WalletStatus::Idle);
        assert_eq!(h.metamask.listener_count(), 0);
        assert!(h.store.contains(WALLET_SESSION_KEY));
    }

    #[tokio::test]
    async fn test_watch_status() {
        let h = harness(WalletConfig::default());
        let rx = h.core.watch_status();
        h.core.connect(WalletType::Metamask, None).await.unwrap();
        assert_eq!(*rx.borrow(), WalletStatus::Connected);
    }
}
