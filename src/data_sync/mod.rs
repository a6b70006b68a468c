/// Data Synchronization Layer
///
/// Keeps the stores in step with the chain and the stat/price services:
///
/// - HTTP fetchers for prices, token metadata and statistics
/// - JSON-RPC bulk reads and WebSocket account/program subscriptions
/// - Per-domain coordinators that fetch in bulk, then apply pushes
/// - A service facade tying them to the connected wallet

pub mod config;
pub mod coordinator;
pub mod domains;
pub mod fetchers;
pub mod registry;
pub mod rpc;
pub mod service;
pub mod websocket;


pub use config::SyncConfig;
pub use coordinator::{Coordinator, CoordinatorState, PushUpdate, SyncDomain};
pub use domains::{PoolDomain, TokenAccountDomain, WalletBalanceDomain};
pub use fetchers::{RemoteFetchers, VolumeStat};
pub use registry::{MintRegistry, PriceService};
pub use rpc::{AccountReader, RpcClient, filter_matches, memcmp_address};
pub use service::{SyncService, SyncServiceBuilder, SyncStats};
pub use websocket::{PushEvent, Subscription, SubscriptionHandle, SubscriptionRequest, SubscriptionSource, WebSocketSource};
