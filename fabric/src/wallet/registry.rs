use crate::core::service::WalletProvider;
use parking_lot::RwLock;
use serde::Serialize;
use shared::dto::{ChainFamily, WalletType};
use std::sync::Arc;

/// Wallet kind as offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedWallet {
    pub wallet_type: WalletType,
    pub name: &'static str,
    pub family: ChainFamily,
    pub installed: bool,
}

/// Registered wallet providers, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<Vec<Arc<dyn WalletProvider>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider`, replacing one of the same wallet type.
    pub fn register(&self, provider: Arc<dyn WalletProvider>) {
        let mut providers = self.providers.write();
        let wallet_type = provider.wallet_type();
        match providers.iter_mut().find(|p| p.wallet_type() == wallet_type) {
            Some(existing) => *existing = provider,
            None => providers.push(provider),
        }
    }

    pub fn get(&self, wallet_type: WalletType) -> Option<Arc<dyn WalletProvider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.wallet_type() == wallet_type)
            .cloned()
    }

    /// First installed provider speaking `family`.
    pub fn first_installed_for(&self, family: ChainFamily) -> Option<Arc<dyn WalletProvider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.wallet_type().family() == family && p.is_installed())
            .cloned()
    }

    pub fn detect_wallets(&self) -> Vec<DetectedWallet> {
        self.providers
            .read()
            .iter()
            .map(|p| {
                let wallet_type = p.wallet_type();
                DetectedWallet {
                    wallet_type,
                    name: wallet_type.name(),
                    family: wallet_type.family(),
                    installed: p.is_installed(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    #[test]
    fn test_first_installed_for_family() {
        let registry = ProviderRegistry::new();
        let phantom = MockProvider::new(WalletType::Phantom, "8W6QginkhTTxoP2deQjq7rZ9YMwN5FH9JYuLfSKuJKAL");
        phantom.set_installed(false);
        registry.register(Arc::new(MockProvider::new(WalletType::Metamask, "0x0")));
        registry.register(Arc::new(phantom));
        registry.register(Arc::new(MockProvider::new(WalletType::Solflare, "x")));

        let solana = registry.first_installed_for(ChainFamily::Solana).unwrap();
        assert_eq!(solana.wallet_type(), WalletType::Solflare);

        let detected = registry.detect_wallets();
        assert_eq!(detected.len(), 3);
        assert!(!detected[1].installed);
        assert_eq!(detected[0].name, "MetaMask");
    }

    #[test]
    fn test_register_replaces_same_type() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new(WalletType::Metamask, "0x1")));
        registry.register(Arc::new(MockProvider::new(WalletType::Metamask, "0x2")));
        assert_eq!(registry.len(), 1);
    }
}
