use super::address::is_valid_address;
use crate::debug::Logger;
use crate::store::{self, Store, StoreError};
use crate::utils::SharedClock;
use shared::dto::{Chain, PersistedWalletSession, WalletType, PERSISTED_SESSION_VERSION};
use std::sync::Arc;

pub const WALLET_SESSION_KEY: &str = "walletSession";

/// A persisted session that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub address: String,
    pub wallet_type: WalletType,
    pub chain: Chain,
    pub saved_at: i64,
}

/// The `walletSession` store slot.
///
/// Reads validate the record and remove it when it is incomplete, from
/// another layout version, carries an address that does not fit its chain,
/// or is older than seven days.
pub struct SessionPersistence {
    store: Arc<dyn Store>,
    clock: SharedClock,
    log: Logger,
}

impl SessionPersistence {
    pub fn new(store: Arc<dyn Store>, clock: SharedClock, log: Logger) -> Self {
        Self { store, clock, log }
    }

    pub fn save(&self, address: &str, wallet_type: WalletType, chain: Chain) -> Result<(), StoreError> {
        let record = PersistedWalletSession::new(address, wallet_type, chain, self.clock.now_millis());
        store::save(self.store.as_ref(), WALLET_SESSION_KEY, &record)
    }

    pub fn load(&self) -> Option<SavedSession> {
        let record = match store::load::<PersistedWalletSession>(self.store.as_ref(), WALLET_SESSION_KEY) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                self.discard(&e.to_string());
                return None;
            }
        };

        match self.validate(record) {
            Ok(saved) => Some(saved),
            Err(reason) => {
                self.discard(reason);
                None
            }
        }
    }

    pub fn clear(&self) {
        self.store.remove(WALLET_SESSION_KEY);
    }

    fn validate(&self, record: PersistedWalletSession) -> Result<SavedSession, &'static str> {
        if record.version != Some(PERSISTED_SESSION_VERSION) {
            return Err("unsupported version");
        }
        if record.is_expired(self.clock.now_millis()) {
            return Err("expired");
        }
        let (Some(address), Some(wallet_type), Some(chain), Some(saved_at)) = (
            record.wallet_address,
            record.wallet_type,
            record.selected_chain,
            record.timestamp,
        ) else {
            return Err("missing fields");
        };
        if !wallet_type.supports(chain) {
            return Err("wallet does not support chain");
        }
        if !is_valid_address(&address, chain) {
            return Err("invalid address");
        }
        Ok(SavedSession {
            address,
            wallet_type,
            chain,
            saved_at,
        })
    }

    fn discard(&self, reason: &str) {
        self.log
            .info("Discarding persisted wallet session")
            .field("reason", reason)
            .emit();
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::utils::{Clock, ManualClock};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    const EVM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, SessionPersistence) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let persistence = SessionPersistence::new(store.clone(), clock.clone(), Logger::new("wallet"));
        (store, clock, persistence)
    }

    #[test]
    fn test_save_then_load() {
        let (_, _, persistence) = setup();
        persistence.save(EVM, WalletType::Metamask, Chain::Base).unwrap();
        let saved = persistence.load().unwrap();
        assert_eq!(saved.address, EVM);
        assert_eq!(saved.chain, Chain::Base);
    }

    #[test]
    fn test_expired_record_is_removed() {
        let (store, clock, persistence) = setup();
        persistence.save(EVM, WalletType::Metamask, Chain::Ethereum).unwrap();
        clock.advance(Duration::days(7));
        assert!(persistence.load().is_some());

        clock.advance(Duration::milliseconds(1));
        assert!(persistence.load().is_none());
        assert!(!store.contains(WALLET_SESSION_KEY));
    }

    #[test]
    fn test_invalid_records_are_removed() {
        let (store, clock, persistence) = setup();
        let now = clock.now_millis();
        let records = [
            json!({"walletType": "metamask", "selectedChain": "ethereum", "timestamp": now, "version": 1}),
            json!({"walletAddress": EVM, "walletType": "metamask", "selectedChain": "ethereum", "timestamp": now, "version": 99}),
            json!({"walletAddress": "0xnothex", "walletType": "metamask", "selectedChain": "ethereum", "timestamp": now, "version": 1}),
            json!({"walletAddress": EVM, "walletType": "phantom", "selectedChain": "ethereum", "timestamp": now, "version": 1}),
            json!({"walletAddress": EVM, "walletType": "netscape", "timestamp": now, "version": 1}),
        ];
        for record in records {
            store.set(WALLET_SESSION_KEY, &record).unwrap();
            assert!(persistence.load().is_none(), "accepted {record}");
            assert!(!store.contains(WALLET_SESSION_KEY));
        }
    }
}
