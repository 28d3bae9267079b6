use shared::dto::Envelope;
use std::sync::Arc;

pub type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct ChannelEntry {
    name: String,
    handlers: Vec<(u64, MessageHandler)>,
    acknowledged: bool,
}

/// Channel name to ordered handler list. Channels keep first-subscribe order.
///
/// A channel exists exactly while it has at least one handler.
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: Vec<ChannelEntry>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, returning its id and whether the channel is new.
    pub fn add(&mut self, channel: &str, handler: MessageHandler) -> (u64, bool) {
        self.next_id += 1;
        let id = self.next_id;
        match self.channels.iter_mut().find(|c| c.name == channel) {
            Some(entry) => {
                entry.handlers.push((id, handler));
                (id, false)
            }
            None => {
                self.channels.push(ChannelEntry {
                    name: channel.to_string(),
                    handlers: vec![(id, handler)],
                    acknowledged: false,
                });
                (id, true)
            }
        }
    }

    /// Remove handler `id`. Returns its channel and whether that channel is now gone.
    pub fn remove(&mut self, id: u64) -> Option<(String, bool)> {
        let index = self
            .channels
            .iter()
            .position(|c| c.handlers.iter().any(|(h, _)| *h == id))?;
        let entry = &mut self.channels[index];
        entry.handlers.retain(|(h, _)| *h != id);
        if entry.handlers.is_empty() {
            let removed = self.channels.remove(index);
            Some((removed.name, true))
        } else {
            Some((entry.name.clone(), false))
        }
    }

    pub fn handlers_for(&self, channel: &str) -> Vec<MessageHandler> {
        self.channels
            .iter()
            .find(|c| c.name == channel)
            .map(|c| c.handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.channels
            .iter()
            .find(|c| c.name == channel)
            .map(|c| c.handlers.len())
            .unwrap_or(0)
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn mark_acknowledged(&mut self, channel: &str) -> bool {
        match self.channels.iter_mut().find(|c| c.name == channel) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn is_acknowledged(&self, channel: &str) -> bool {
        self.channels
            .iter()
            .any(|c| c.name == channel && c.acknowledged)
    }

    pub fn reset_acknowledgements(&mut self) {
        for entry in &mut self.channels {
            entry.acknowledged = false;
        }
    }
}
