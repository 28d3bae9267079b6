//! Offline queue replay across connectivity changes and reloads.

use fabric::offline::{stored_items, OfflineConfig, OfflineEvent, OfflineFabric, QueueSummary};
use fabric::store::{MemoryStore, Store};
use fabric::testing::{eventually, MockProbe};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const QUEUE_KEY: &str = "offlineQueue";

fn config() -> OfflineConfig {
    OfflineConfig {
        health_check_urls: vec![
            "http://primary.test/api/health".to_string(),
            "http://fallback.test/api/health".to_string(),
        ],
        ..OfflineConfig::default()
    }
}

fn record_trades(fabric: &OfflineFabric) -> Arc<Mutex<Vec<Value>>> {
    let replayed = Arc::new(Mutex::new(Vec::new()));
    let sink = replayed.clone();
    fabric.register_fn("trade", move |request| {
        let sink = sink.clone();
        async move {
            sink.lock().push(request.data);
            Ok(())
        }
    });
    replayed
}

#[tokio::test(start_paused = true)]
async fn queued_trade_replays_when_back_online() {
    let store = Arc::new(MemoryStore::new());
    let probe = Arc::new(MockProbe::new(false, Duration::from_millis(80)));
    let fabric = OfflineFabric::new(config(), probe.clone(), store.clone());
    let replayed = record_trades(&fabric);

    let summaries: Arc<Mutex<Vec<QueueSummary>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = summaries.clone();
    let _listener = fabric.subscribe(move |event| {
        if let OfflineEvent::QueueProcessed(summary) = event {
            sink.lock().push(*summary);
        }
    });

    assert!(!fabric.check_connection().await);
    assert!(!fabric.is_online());

    fabric.queue_request("trade", json!({"id": "T1"})).unwrap();
    assert_eq!(fabric.queue_size(), 1);
    assert_eq!(stored_items(store.as_ref(), QUEUE_KEY).len(), 1);
    assert!(replayed.lock().is_empty());

    probe.set_online(true);
    fabric.handle_connectivity_hint(true).await;
    assert!(fabric.is_online());

    eventually(|| !summaries.lock().is_empty()).await;
    assert_eq!(*replayed.lock(), vec![json!({"id": "T1"})]);
    assert_eq!(
        summaries.lock()[0],
        QueueSummary {
            successful: 1,
            failed: 0,
            remaining: 0
        }
    );
    assert_eq!(fabric.queue_size(), 0);
    assert!(stored_items(store.as_ref(), QUEUE_KEY).is_empty());
}

#[tokio::test]
async fn queued_request_survives_reload_and_replays_once() {
    let store = Arc::new(MemoryStore::new());
    let probe = Arc::new(MockProbe::new(true, Duration::from_millis(20)));
    {
        let fabric = OfflineFabric::new(config(), probe.clone(), store.clone());
        fabric.queue_request("trade", json!({"id": "T2"})).unwrap();
    }
    assert!(store.get(QUEUE_KEY).unwrap().is_some());

    let reloaded = OfflineFabric::new(config(), probe, store.clone());
    let replayed = record_trades(&reloaded);
    assert_eq!(reloaded.queue_size(), 1);

    let summary = reloaded.retry_queue().await.unwrap();
    assert_eq!(summary.successful, 1);
    assert_eq!(reloaded.retry_queue().await.unwrap().successful, 0);
    assert_eq!(*replayed.lock(), vec![json!({"id": "T2"})]);
    assert!(stored_items(store.as_ref(), QUEUE_KEY).is_empty());
}
