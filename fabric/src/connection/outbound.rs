use shared::dto::Envelope;
use std::collections::VecDeque;

/// Bounded FIFO of envelopes waiting for an open transport.
///
/// On overflow the oldest entry is dropped and returned to the caller for
/// logging.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    pub fn push_back(&mut self, envelope: Envelope) -> Vec<Envelope> {
        self.items.push_back(envelope);
        self.trim()
    }

    /// Put `envelopes` back at the head, keeping their relative order.
    pub fn requeue_front(&mut self, envelopes: Vec<Envelope>) -> Vec<Envelope> {
        for envelope in envelopes.into_iter().rev() {
            self.items.push_front(envelope);
        }
        self.trim()
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn trim(&mut self) -> Vec<Envelope> {
        let mut dropped = Vec::new();
        while self.items.len() > self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                dropped.push(oldest);
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(n: u64) -> Envelope {
        Envelope::new("trade", "trades", json!({ "n": n }), "client")
    }

    fn numbers(envs: &[Envelope]) -> Vec<u64> {
        envs.iter().map(|e| e.data["n"].as_u64().unwrap()).collect()
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = OutboundQueue::new(2);
        assert!(queue.push_back(env(1)).is_empty());
        assert!(queue.push_back(env(2)).is_empty());

        let dropped = queue.push_back(env(3));
        assert_eq!(numbers(&dropped), vec![1]);
        assert_eq!(numbers(&queue.drain()), vec![2, 3]);
    }

    #[test]
    fn test_requeue_front_keeps_order() {
        let mut queue = OutboundQueue::new(10);
        queue.push_back(env(3));
        queue.requeue_front(vec![env(1), env(2)]);
        assert_eq!(numbers(&queue.drain()), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
