use super::keyed_store::KeyedStore;
use super::price_cache::PriceCache;
use crate::accounts::{PoolData, TokenAccount};
use crate::utils::address::Pubkey;
use crate::utils::token::MintMetadataWrapper;
use std::sync::Arc;
use std::time::Duration;

pub type MintStore = KeyedStore<Pubkey, MintMetadataWrapper>;
pub type BalanceStore = KeyedStore<Pubkey, u64>;
pub type TokenAccountStore = KeyedStore<Pubkey, TokenAccount>;
pub type PoolStore = KeyedStore<Pubkey, PoolData>;

/// All process-wide stores, built once at startup and handed to coordinators
/// and selectors by `Arc`.
pub struct AppStores {
    /// Mint address -> metadata (insert-only)
    pub mints: MintStore,
    /// Mint address -> price
    pub prices: PriceCache,
    /// Wallet address -> lamports
    pub balances: BalanceStore,
    /// Token account address -> account, scoped to the connected wallet
    pub token_accounts: TokenAccountStore,
    /// Pool address -> pool state, never in the Deleted state
    pub pools: PoolStore,
}

impl AppStores {
    pub fn new(price_ttl: Duration) -> Self {
        Self {
            mints: KeyedStore::new("mints"),
            prices: PriceCache::new(price_ttl),
            balances: KeyedStore::new("balances"),
            token_accounts: KeyedStore::new("token_accounts"),
            pools: KeyedStore::new("pools"),
        }
    }

    pub fn shared(price_ttl: Duration) -> Arc<Self> {
        Arc::new(Self::new(price_ttl))
    }
}

impl Default for AppStores {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreSizes {
    pub mints: usize,
    pub prices: usize,
    pub balances: usize,
    pub token_accounts: usize,
    pub pools: usize,
}

impl AppStores {
    pub fn sizes(&self) -> StoreSizes {
        StoreSizes {
            mints: self.mints.len(),
            prices: self.prices.len(),
            balances: self.balances.len(),
            token_accounts: self.token_accounts.len(),
            pools: self.pools.len(),
        }
    }
}
