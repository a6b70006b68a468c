use crate::data_sync::{
    config::SyncConfig,
    coordinator::{Coordinator, CoordinatorState},
    domains::{PoolDomain, TokenAccountDomain, WalletBalanceDomain},
    fetchers::{RemoteFetchers, VolumeStat},
    registry::{MintRegistry, PriceService},
    rpc::{AccountReader, RpcClient},
    websocket::{SubscriptionSource, WebSocketSource},
};
use crate::error::SyncError;
use crate::logic::{BulkSender, JupiterAggregator, QuoteAggregator, QuoteEngine, SwapFormStore};
use crate::store::{AppStores, StoreSizes};
use crate::utils::address::{Pubkey, parse_pubkey};
use eyre::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Snapshot of what the service is doing.
#[derive(Debug, Clone)]
pub struct SyncStats {
    pub running: bool,
    pub wallet: Option<Pubkey>,
    pub pools: CoordinatorState,
    pub wallet_balance: CoordinatorState,
    pub token_accounts: CoordinatorState,
    pub store_sizes: StoreSizes,
    pub price_hit_rate: f64,
}

/// Main data synchronization service
///
/// Owns the stores and one coordinator per synced domain. Pools sync for the
/// life of the service; wallet balance and token accounts follow the
/// connected wallet. While running, a housekeeping task sweeps expired
/// prices and restarts coordinators whose subscription ended.
pub struct SyncService {
    config: SyncConfig,
    stores: Arc<AppStores>,
    fetchers: Arc<RemoteFetchers>,
    mints: MintRegistry,
    prices: PriceService,

    pools: Arc<Coordinator<PoolDomain>>,
    wallet_balance: Arc<Coordinator<WalletBalanceDomain>>,
    token_accounts: Arc<Coordinator<TokenAccountDomain>>,

    quotes: Arc<QuoteEngine>,
    swap_form: SwapFormStore,
    bulk_sender: BulkSender,

    wallet: RwLock<Option<Pubkey>>,
    housekeeping_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    fn new(
        config: SyncConfig,
        stores: Arc<AppStores>,
        reader: Arc<dyn AccountReader>,
        source: Arc<dyn SubscriptionSource>,
        aggregator: Arc<dyn QuoteAggregator>,
    ) -> Result<Self> {
        info!("Initializing SyncService");

        let fetchers = Arc::new(RemoteFetchers::new(&config)?);
        let token_program = config.token_program()?;
        let pool_program = config.pool_program()?;

        let pools =
            Arc::new(Coordinator::new(Arc::new(PoolDomain::new(stores.clone(), reader.clone(), pool_program)), source.clone()));
        let wallet_balance =
            Arc::new(Coordinator::new(Arc::new(WalletBalanceDomain::new(stores.clone(), reader.clone())), source.clone()));
        let token_accounts =
            Arc::new(Coordinator::new(Arc::new(TokenAccountDomain::new(stores.clone(), reader, token_program)), source));

        let quotes = Arc::new(QuoteEngine::new(aggregator, config.quote_debounce()));
        let swap_form = SwapFormStore::new(stores.clone(), quotes.clone());
        let bulk_sender = BulkSender::open(&config.storage_dir);

        Ok(Self {
            mints: MintRegistry::new(stores.clone(), fetchers.clone()),
            prices: PriceService::new(stores.clone(), fetchers.clone()),
            config,
            stores,
            fetchers,
            pools,
            wallet_balance,
            token_accounts,
            quotes,
            swap_form,
            bulk_sender,
            wallet: RwLock::new(None),
            housekeeping_task: Mutex::new(None),
        })
    }

    /// Load the token list and begin syncing pools.
    pub async fn start(&self) -> Result<(), SyncError> {
        if self.is_running() {
            return Err(SyncError::AlreadyStarted);
        }
        info!("Starting SyncService");

        self.mints.load_token_list().await;
        if let Err(e) = self.bulk_sender.restore() {
            warn!("Bulk sender draft not restored: {}", e);
        }
        self.pools.activate(());

        let stores = Arc::clone(&self.stores);
        let pools = Arc::clone(&self.pools);
        let wallet_balance = Arc::clone(&self.wallet_balance);
        let token_accounts = Arc::clone(&self.token_accounts);
        let sweep_period = self.config.price_ttl().max(Duration::from_secs(1));
        let resume_period = self.config.reconnect_delay().max(Duration::from_secs(1));
        let task = tokio::spawn(async move {
            let mut sweep = interval(sweep_period);
            let mut resume = interval(resume_period);
            resume.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = sweep.tick() => {
                        stores.prices.cleanup_expired();
                        debug!("Price cache swept, {} entries left", stores.prices.len());
                    }
                    _ = resume.tick() => {
                        let resumed = [pools.resume_if_idle(), wallet_balance.resume_if_idle(), token_accounts.resume_if_idle()];
                        if resumed.contains(&true) {
                            info!("Restarted idle coordinators: {:?}", resumed);
                        }
                    }
                }
            }
        });
        *self.housekeeping_task.lock() = Some(task);

        info!("SyncService started successfully");
        Ok(())
    }

    /// Tear every coordinator down. Stores keep their last contents except
    /// the wallet-scoped ones.
    pub fn stop(&self) {
        info!("Stopping SyncService");
        self.disconnect_wallet();
        self.pools.deactivate();
        self.quotes.reset();
        if let Some(task) = self.housekeeping_task.lock().take() {
            task.abort();
        }
        info!("SyncService stopped");
    }

    /// Sync balance and token accounts for `wallet`. A different wallet
    /// replaces the current one; the same wallet is a no-op.
    pub fn connect_wallet(&self, wallet: Pubkey) -> Result<(), SyncError> {
        if !self.is_running() {
            return Err(SyncError::NotStarted);
        }
        info!("Connecting wallet {}", wallet);
        *self.wallet.write() = Some(wallet);
        self.wallet_balance.activate(wallet);
        self.token_accounts.activate(wallet);
        Ok(())
    }

    pub fn connect_wallet_str(&self, wallet: &str) -> Result<(), SyncError> {
        self.connect_wallet(parse_pubkey(wallet)?)
    }

    pub fn disconnect_wallet(&self) {
        if let Some(wallet) = self.wallet.write().take() {
            info!("Disconnecting wallet {}", wallet);
        }
        self.wallet_balance.deactivate();
        self.token_accounts.deactivate();
    }

    pub fn wallet(&self) -> Result<Pubkey, SyncError> {
        self.wallet.read().ok_or(SyncError::WalletNotConnected)
    }

    pub fn is_running(&self) -> bool {
        self.housekeeping_task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stores(&self) -> &Arc<AppStores> {
        &self.stores
    }

    pub fn mints(&self) -> &MintRegistry {
        &self.mints
    }

    pub fn prices(&self) -> &PriceService {
        &self.prices
    }

    pub fn fetchers(&self) -> &Arc<RemoteFetchers> {
        &self.fetchers
    }

    pub fn pools(&self) -> &Coordinator<PoolDomain> {
        &self.pools
    }

    pub fn wallet_balance(&self) -> &Coordinator<WalletBalanceDomain> {
        &self.wallet_balance
    }

    pub fn token_accounts(&self) -> &Coordinator<TokenAccountDomain> {
        &self.token_accounts
    }

    pub fn quote_engine(&self) -> &Arc<QuoteEngine> {
        &self.quotes
    }

    pub fn swap_form(&self) -> &SwapFormStore {
        &self.swap_form
    }

    pub fn bulk_sender(&self) -> &BulkSender {
        &self.bulk_sender
    }

    pub async fn all_tvl(&self) -> f64 {
        self.fetchers.fetch_all_tvl().await
    }

    pub async fn total_tvl(&self, address: &Pubkey) -> f64 {
        self.fetchers.fetch_total_tvl(address).await
    }

    pub async fn all_volume(&self) -> VolumeStat {
        self.fetchers.fetch_all_volume().await
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            running: self.is_running(),
            wallet: *self.wallet.read(),
            pools: self.pools.state(),
            wallet_balance: self.wallet_balance.state(),
            token_accounts: self.token_accounts.state(),
            store_sizes: self.stores.sizes(),
            price_hit_rate: self.stores.prices.stats.hit_rate(),
        }
    }

    /// Get service configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncService dropped while running, stopping");
            self.stop();
        }
    }
}

/// Builder for SyncService to make creation more ergonomic
#[derive(Default)]
pub struct SyncServiceBuilder {
    config: Option<SyncConfig>,
    stores: Option<Arc<AppStores>>,
    reader: Option<Arc<dyn AccountReader>>,
    source: Option<Arc<dyn SubscriptionSource>>,
    aggregator: Option<Arc<dyn QuoteAggregator>>,
}

impl SyncServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_stores(mut self, stores: Arc<AppStores>) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn AccountReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn SubscriptionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn QuoteAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn build(self) -> Result<SyncService> {
        let config = match self.config {
            Some(config) => config,
            None => SyncConfig::from_env().unwrap_or_else(|e| {
                warn!("Falling back to default config: {}", e);
                SyncConfig::default()
            }),
        };
        config.validate()?;

        let stores = self.stores.unwrap_or_else(|| AppStores::shared(config.price_ttl()));
        let reader = match self.reader {
            Some(reader) => reader,
            None => Arc::new(RpcClient::new(config.rpc_http_url.clone(), config.http_timeout())),
        };
        let source = self.source.unwrap_or_else(|| Arc::new(WebSocketSource::from_config(&config)));
        let aggregator = match self.aggregator {
            Some(aggregator) => aggregator,
            None => Arc::new(JupiterAggregator::new(&config)?),
        };

        SyncService::new(config, stores, reader, source, aggregator)
    }
}
