//! Restoring a persisted wallet session after a reload.

use fabric::store::{MemoryStore, Store};
use fabric::testing::{eventually, MockProvider};
use fabric::wallet::{
    ProviderRegistry, WalletConfig, WalletEvent, WalletSessionCore, WalletStatus,
    WALLET_SESSION_KEY,
};
use parking_lot::Mutex;
use serde_json::json;
use shared::dto::{Chain, WalletType};
use std::sync::Arc;
use std::time::Duration;

const ADDRESS: &str = "0xabc0000000000000000000000000000000000def";
const HOUR_MS: i64 = 60 * 60 * 1000;

fn reloaded_store(wallet_type: &str, saved_at: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            WALLET_SESSION_KEY,
            &json!({
                "walletAddress": ADDRESS,
                "walletType": wallet_type,
                "selectedChain": "ethereum",
                "timestamp": saved_at,
                "version": 1
            }),
        )
        .unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn restore_after_reload_runs_once() {
    let store = reloaded_store("metamask", lib_utils::now_millis() - HOUR_MS);
    let metamask = MockProvider::new(WalletType::Metamask, ADDRESS);
    metamask.set_accounts(vec![ADDRESS.to_string()]);
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(metamask.clone()));

    let core = WalletSessionCore::new(WalletConfig::default(), registry, store.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _listener = core.subscribe(move |event| sink.lock().push(event.clone()));

    core.mount();
    tokio::time::sleep(Duration::from_millis(20)).await;
    core.mount();

    eventually(|| core.is_connected()).await;
    assert_eq!(core.address().as_deref(), Some(ADDRESS));
    assert_eq!(core.chain(), Chain::Ethereum);
    assert_eq!(core.wallet_type(), Some(WalletType::Metamask));
    assert_eq!(metamask.connect_calls(), 0);

    core.mount();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(metamask.account_queries(), 1);
    assert_eq!(core.status(), WalletStatus::Connected);

    let restored = events
        .lock()
        .iter()
        .filter(|e| matches!(e, WalletEvent::Restored { .. }))
        .count();
    assert_eq!(restored, 1);
    assert!(store.get(WALLET_SESSION_KEY).unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn restore_with_missing_wallet_clears_record() {
    let store = reloaded_store("metamask", lib_utils::now_millis() - HOUR_MS);
    let metamask = MockProvider::new(WalletType::Metamask, ADDRESS);
    metamask.set_installed(false);
    let registry = ProviderRegistry::new();
    registry.register(Arc::new(metamask.clone()));

    let core = WalletSessionCore::new(WalletConfig::default(), registry, store.clone());
    assert_eq!(core.restore_session().await, None);
    assert_eq!(core.status(), WalletStatus::Idle);
    assert!(store.get(WALLET_SESSION_KEY).unwrap().is_none());
}
