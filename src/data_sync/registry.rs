use crate::data_sync::fetchers::RemoteFetchers;
use crate::store::AppStores;
use crate::utils::address::Pubkey;
use crate::utils::constants::MAINNET_CHAIN_ID;
use crate::utils::token::MintMetadata;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Mint metadata: bulk-loaded from the token list, refined lazily per
/// address. Entries are never overwritten once present.
#[derive(Clone)]
pub struct MintRegistry {
    stores: Arc<AppStores>,
    fetchers: Arc<RemoteFetchers>,
}

impl MintRegistry {
    pub fn new(stores: Arc<AppStores>, fetchers: Arc<RemoteFetchers>) -> Self {
        Self { stores, fetchers }
    }

    /// Load the token list into the mint store. Returns the number of new
    /// entries.
    pub async fn load_token_list(&self) -> usize {
        let list = self.fetchers.fetch_token_list().await;
        let mainnet = list.into_iter().filter(|m| m.chain_id == MAINNET_CHAIN_ID || m.chain_id == 0);
        let added = self.stores.mints.insert_missing(mainnet.map(|m| (m.address, Arc::new(m))));
        info!("Token list loaded, {} new mints ({} total)", added, self.stores.mints.len());
        added
    }

    pub fn get(&self, mint: &Pubkey) -> Option<Arc<MintMetadata>> {
        self.stores.mints.get(mint)
    }

    /// Metadata for `mint`, fetched and stored on first use.
    pub async fn resolve(&self, mint: &Pubkey) -> Option<Arc<MintMetadata>> {
        if let Some(found) = self.stores.mints.get(mint) {
            return Some(found);
        }
        let metadata = self.fetchers.fetch_metadata(mint).await?;
        debug!("Resolved metadata for {}", mint);
        self.stores.mints.insert_missing([(*mint, Arc::new(metadata))]);
        self.stores.mints.get(mint)
    }
}

/// Prices with a freshness window; see `PriceCache`.
#[derive(Clone)]
pub struct PriceService {
    stores: Arc<AppStores>,
    fetchers: Arc<RemoteFetchers>,
}

impl PriceService {
    pub fn new(stores: Arc<AppStores>, fetchers: Arc<RemoteFetchers>) -> Self {
        Self { stores, fetchers }
    }

    /// Cached price if still fresh, otherwise a new fetch. Failed fetches
    /// return 0 and are not cached.
    pub async fn price(&self, mint: &Pubkey) -> f64 {
        if let Some(price) = self.stores.prices.get(mint) {
            return price;
        }
        let price = self.fetchers.fetch_price(mint).await;
        if price > 0.0 {
            self.stores.prices.set(*mint, price);
        }
        price
    }

    /// Prices in the order of `mints`.
    pub async fn prices(&self, mints: &[Pubkey]) -> Vec<f64> {
        join_all(mints.iter().map(|mint| self.price(mint))).await
    }
}
