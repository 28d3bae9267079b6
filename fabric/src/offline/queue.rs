use crate::debug::Logger;
use crate::store::{self, Store, StoreError};
use serde_json::Value;
use shared::dto::QueuedRequest;
use std::collections::VecDeque;

/// Bounded, insertion-ordered request log mirrored to the store.
#[derive(Debug)]
pub struct RequestQueue {
    items: VecDeque<QueuedRequest>,
    max_size: usize,
    key: String,
}

impl RequestQueue {
    pub fn new(key: impl Into<String>, max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
            key: key.into(),
        }
    }

    /// Load the persisted queue. A corrupt record is dropped from the store;
    /// an oversized one keeps only its newest entries.
    pub fn load(store: &dyn Store, key: &str, max_size: usize, log: &Logger) -> Self {
        let mut queue = Self::new(key, max_size);
        match store::load::<Vec<QueuedRequest>>(store, key) {
            Ok(Some(items)) => {
                let skip = items.len().saturating_sub(max_size);
                queue.items = items.into_iter().skip(skip).collect();
                log.info("Loaded offline queue")
                    .field("queue_size", queue.items.len())
                    .field("trimmed", skip)
                    .emit();
            }
            Ok(None) => {}
            Err(StoreError::Serialization(e)) => {
                log.warn("Discarding unreadable offline queue")
                    .field("error", e.to_string())
                    .emit();
                store.remove(key);
            }
            Err(e) => {
                log.warn("Offline queue unavailable, starting empty")
                    .field("error", e.to_string())
                    .emit();
            }
        }
        queue
    }

    /// Append `request`, evicting from the head to stay within bounds.
    /// Returns the evicted requests.
    pub fn push(&mut self, request: QueuedRequest) -> Vec<QueuedRequest> {
        self.items.push_back(request);
        let mut evicted = Vec::new();
        while self.items.len() > self.max_size {
            if let Some(oldest) = self.items.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Undo a [`push`](Self::push): drop `id` and put the evicted requests back.
    pub fn rollback(&mut self, id: &str, evicted: Vec<QueuedRequest>) {
        self.remove(id);
        for request in evicted.into_iter().rev() {
            self.items.push_front(request);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<QueuedRequest> {
        let index = self.items.iter().position(|r| r.id == id)?;
        self.items.remove(index)
    }

    /// Bump the retry counter of `id`, returning the new count.
    pub fn increment_retry(&mut self, id: &str) -> Option<u32> {
        let request = self.items.iter_mut().find(|r| r.id == id)?;
        request.retry_count += 1;
        Some(request.retry_count)
    }

    pub fn snapshot(&self) -> Vec<QueuedRequest> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    pub fn persist(&self, store: &dyn Store) -> Result<(), StoreError> {
        let items: Vec<&QueuedRequest> = self.items.iter().collect();
        let value = serde_json::to_value(items)?;
        store.set(&self.key, &value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Raw persisted form, for inspection.
pub fn stored_items(store: &dyn Store, key: &str) -> Vec<Value> {
    match store.get(key) {
        Ok(Some(Value::Array(items))) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn request(n: i64) -> QueuedRequest {
        QueuedRequest::new("trade", json!({ "n": n }), n)
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut queue = RequestQueue::new("offlineQueue", 2);
        assert!(queue.push(request(1)).is_empty());
        assert!(queue.push(request(2)).is_empty());
        let evicted = queue.push(request(3));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].data["n"], 1);
        let remaining: Vec<i64> = queue.snapshot().iter().map(|r| r.timestamp).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn test_rollback_restores_evicted() {
        let mut queue = RequestQueue::new("offlineQueue", 1);
        queue.push(request(1));
        let newest = request(2);
        let id = newest.id.clone();
        let evicted = queue.push(newest);
        queue.rollback(&id, evicted);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.snapshot()[0].timestamp, 1);
    }

    #[test]
    fn test_persist_and_reload() {
        let store = MemoryStore::new();
        let log = Logger::new("offline");
        let mut queue = RequestQueue::new("offlineQueue", 10);
        let first = request(1);
        queue.push(first.clone());
        queue.push(request(2));
        assert_eq!(queue.increment_retry(&first.id), Some(1));
        queue.persist(&store).unwrap();

        let reloaded = RequestQueue::load(&store, "offlineQueue", 10, &log);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.snapshot()[0].retry_count, 1);
        assert_eq!(stored_items(&store, "offlineQueue")[0]["retryCount"], 1);
    }

    #[test]
    fn test_corrupt_record_is_removed() {
        let store = MemoryStore::new();
        store.set("offlineQueue", &json!({"not": "a list"})).unwrap();
        let queue = RequestQueue::load(&store, "offlineQueue", 10, &Logger::new("offline"));
        assert!(queue.is_empty());
        assert!(!store.contains("offlineQueue"));
    }

    #[test]
    fn test_oversized_record_keeps_newest() {
        let store = MemoryStore::new();
        let items: Vec<QueuedRequest> = (1..=5).map(request).collect();
        store::save(&store, "offlineQueue", &items).unwrap();
        let queue = RequestQueue::load(&store, "offlineQueue", 3, &Logger::new("offline"));
        let kept: Vec<i64> = queue.snapshot().iter().map(|r| r.timestamp).collect();
        assert_eq!(kept, vec![3, 4, 5]);
    }
}
