/// Store Layer
///
/// Process-wide keyed stores mirroring remote state, plus durable local
/// storage for drafts that must survive a restart.
pub mod context;
pub mod keyed_store;
pub mod local_storage;
pub mod price_cache;

pub use context::{AppStores, BalanceStore, MintStore, PoolStore, StoreSizes, TokenAccountStore};
pub use keyed_store::KeyedStore;
pub use local_storage::{LocalStorage, StorageError};
pub use price_cache::{CacheItem, CacheStats, PriceCache};
