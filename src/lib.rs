// Three-Layer Architecture
pub mod data_sync; // Data Layer: bulk fetch + push subscriptions, prices, metadata
pub mod logic; // Logic Layer: selectors, quoting, swap form, bulk sender
pub mod store; // Store Layer: keyed stores, price cache, local storage

// Common types
pub mod accounts;
pub mod error;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export key components from each layer
pub use data_sync::{
    Coordinator, CoordinatorState, MintRegistry, PoolDomain, PriceService, RemoteFetchers, RpcClient, SyncConfig,
    SyncService, SyncServiceBuilder, SyncStats, TokenAccountDomain, WalletBalanceDomain, WebSocketSource,
};
pub use error::SyncError;
pub use logic::{BulkSender, QuoteEngine, Selectors, SwapFormStore};
pub use store::{AppStores, KeyedStore, PriceCache};
pub use utils::{MintMetadata, Pubkey};
