use crate::accounts::{PoolData, TokenAccount};
use crate::store::AppStores;
use crate::utils::address::Pubkey;
use crate::utils::amount::to_ui_amount;
use crate::utils::constants::{LAMPORTS_PER_SOL, WRAPPED_SOL_MINT};
use crate::utils::token::MintMetadata;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

struct Cached<A, T> {
    versions: Vec<u64>,
    arg: A,
    value: Arc<T>,
    valid_until: Option<Instant>,
}

/// Single-slot memo keyed by the versions of the stores read and the
/// argument. A hit hands back the very same `Arc`.
pub struct Memo<A, T> {
    slot: Mutex<Option<Cached<A, T>>>,
}

impl<A: PartialEq + Clone, T> Memo<A, T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub fn get_or_compute(&self, versions: &[u64], arg: &A, compute: impl FnOnce() -> T) -> Arc<T> {
        self.get_or_compute_until(versions, arg, || (compute(), None))
    }

    /// Like `get_or_compute`, but the computation also reports when its
    /// result lapses on its own (e.g. the earliest price expiry it read).
    pub fn get_or_compute_until(
        &self,
        versions: &[u64],
        arg: &A,
        compute: impl FnOnce() -> (T, Option<Instant>),
    ) -> Arc<T> {
        let mut slot = self.slot.lock();
        if let Some(cached) = slot.as_ref() {
            let live = cached.valid_until.is_none_or(|deadline| Instant::now() < deadline);
            if live && cached.versions.as_slice() == versions && cached.arg == *arg {
                return Arc::clone(&cached.value);
            }
        }
        let (value, valid_until) = compute();
        let value = Arc::new(value);
        *slot = Some(Cached { versions: versions.to_vec(), arg: arg.clone(), value: Arc::clone(&value), valid_until });
        value
    }
}

fn keep_earliest(deadline: &mut Option<Instant>, at: Instant) {
    *deadline = Some(deadline.map_or(at, |current| current.min(at)));
}

impl<A: PartialEq + Clone, T> Default for Memo<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type TokenAccountEntry = (Pubkey, TokenAccount);

/// Read-only projections over `AppStores`.
pub struct Selectors {
    stores: Arc<AppStores>,
    token_account: Memo<(Pubkey, Pubkey), Option<TokenAccountEntry>>,
    token_accounts_of: Memo<Pubkey, Vec<TokenAccountEntry>>,
    prices: Memo<Vec<Pubkey>, Vec<Option<f64>>>,
    pools_with_mint: Memo<Pubkey, Vec<(Pubkey, PoolData)>>,
    portfolio_value: Memo<Pubkey, f64>,
}

impl Selectors {
    pub fn new(stores: Arc<AppStores>) -> Self {
        Self {
            stores,
            token_account: Memo::new(),
            token_accounts_of: Memo::new(),
            prices: Memo::new(),
            pools_with_mint: Memo::new(),
            portfolio_value: Memo::new(),
        }
    }

    /// The account holding `mint` for `owner`. With several such accounts the
    /// one with the largest amount wins.
    pub fn token_account(&self, owner: &Pubkey, mint: &Pubkey) -> Arc<Option<TokenAccountEntry>> {
        let (version, accounts) = self.stores.token_accounts.versioned_snapshot();
        self.token_account.get_or_compute(&[version], &(*owner, *mint), || {
            accounts
                .iter()
                .filter(|(_, account)| account.owner == *owner && account.mint == *mint)
                .max_by_key(|(address, account)| (account.amount, **address))
                .map(|(address, account)| (*address, account.clone()))
        })
    }

    /// All token accounts of `owner`, ordered by address.
    pub fn token_accounts_of(&self, owner: &Pubkey) -> Arc<Vec<TokenAccountEntry>> {
        let (version, accounts) = self.stores.token_accounts.versioned_snapshot();
        self.token_accounts_of.get_or_compute(&[version], owner, || {
            let mut owned: Vec<TokenAccountEntry> = accounts
                .iter()
                .filter(|(_, account)| account.owner == *owner)
                .map(|(address, account)| (*address, account.clone()))
                .collect();
            owned.sort_by_key(|(address, _)| *address);
            owned
        })
    }

    /// Fresh prices for `mints`, `None` where unknown or stale.
    pub fn prices(&self, mints: &[Pubkey]) -> Arc<Vec<Option<f64>>> {
        let version = self.stores.prices.version();
        self.prices.get_or_compute_until(&[version], &mints.to_vec(), || {
            let mut valid_until = None;
            let prices = mints
                .iter()
                .map(|mint| {
                    let (price, expires_at) = self.stores.prices.peek_with_expiry(mint)?;
                    keep_earliest(&mut valid_until, expires_at);
                    Some(price)
                })
                .collect();
            (prices, valid_until)
        })
    }

    pub fn mint(&self, mint: &Pubkey) -> Option<Arc<MintMetadata>> {
        self.stores.mints.get(mint)
    }

    /// Pools that list `mint`, ordered by pool address.
    pub fn pools_with_mint(&self, mint: &Pubkey) -> Arc<Vec<(Pubkey, PoolData)>> {
        let (version, pools) = self.stores.pools.versioned_snapshot();
        self.pools_with_mint.get_or_compute(&[version], mint, || {
            let mut matching: Vec<(Pubkey, PoolData)> = pools
                .iter()
                .filter(|(_, pool)| pool.contains_mint(mint))
                .map(|(address, pool)| (*address, pool.clone()))
                .collect();
            matching.sort_by_key(|(address, _)| *address);
            matching
        })
    }

    pub fn wallet_balance(&self, wallet: &Pubkey) -> Option<u64> {
        self.stores.balances.get(wallet)
    }

    /// Wallet balance in SOL.
    pub fn wallet_balance_sol(&self, wallet: &Pubkey) -> Option<f64> {
        self.wallet_balance(wallet).map(|lamports| lamports as f64 / LAMPORTS_PER_SOL as f64)
    }

    /// Native SOL (priced as wrapped SOL) plus amount × price over the
    /// owner's token accounts. Holdings whose mint metadata or price is
    /// unknown contribute nothing.
    pub fn portfolio_value(&self, owner: &Pubkey) -> Arc<f64> {
        let (accounts_version, accounts) = self.stores.token_accounts.versioned_snapshot();
        let versions = [
            accounts_version,
            self.stores.balances.version(),
            self.stores.mints.version(),
            self.stores.prices.version(),
        ];
        self.portfolio_value.get_or_compute_until(&versions, owner, || {
            let mut valid_until = None;
            let mut price_of = |mint: &Pubkey| {
                let (price, expires_at) = self.stores.prices.peek_with_expiry(mint)?;
                keep_earliest(&mut valid_until, expires_at);
                Some(price)
            };
            let native = WRAPPED_SOL_MINT
                .parse::<Pubkey>()
                .ok()
                .and_then(|wsol| Some(self.wallet_balance_sol(owner)? * price_of(&wsol)?))
                .unwrap_or(0.0);
            let tokens: f64 = accounts
                .values()
                .filter(|account| account.owner == *owner)
                .filter_map(|account| {
                    let decimals = self.stores.mints.get(&account.mint)?.decimals;
                    Some(to_ui_amount(account.amount, decimals) * price_of(&account.mint)?)
                })
                .sum();
            (native + tokens, valid_until)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::pool::tests::sample_pool;
    use crate::accounts::{PoolState, token_account};
    use std::time::Duration;

    fn setup() -> (Arc<AppStores>, Selectors) {
        let stores = AppStores::shared(Duration::from_secs(60));
        (stores.clone(), Selectors::new(stores))
    }

    #[test]
    fn test_memo_returns_same_arc_until_store_changes() {
        let (stores, selectors) = setup();
        let owner = Pubkey::new_from_array([1; 32]);
        let mint = Pubkey::new_from_array([2; 32]);
        stores.token_accounts.upsert_one(Pubkey::new_from_array([10; 32]), token_account(mint, owner, 5));

        let first = selectors.token_accounts_of(&owner);
        let second = selectors.token_accounts_of(&owner);
        assert!(Arc::ptr_eq(&first, &second));

        stores.token_accounts.upsert_one(Pubkey::new_from_array([11; 32]), token_account(mint, owner, 6));
        let third = selectors.token_accounts_of(&owner);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_missing_data_is_none() {
        let (_, selectors) = setup();
        assert!(selectors.token_account(&Pubkey::new_from_array([1; 32]), &Pubkey::new_from_array([2; 32])).is_none());
        assert!(selectors.mint(&Pubkey::new_from_array([2; 32])).is_none());
        assert_eq!(*selectors.prices(&[Pubkey::new_from_array([2; 32])]), vec![None]);
        assert_eq!(selectors.wallet_balance(&Pubkey::new_from_array([1; 32])), None);
    }

    #[test]
    fn test_token_account_prefers_largest() {
        let (stores, selectors) = setup();
        let owner = Pubkey::new_from_array([1; 32]);
        let mint = Pubkey::new_from_array([2; 32]);
        stores.token_accounts.upsert([
            (Pubkey::new_from_array([10; 32]), token_account(mint, owner, 5)),
            (Pubkey::new_from_array([11; 32]), token_account(mint, owner, 50)),
            (Pubkey::new_from_array([12; 32]), token_account(mint, Pubkey::new_from_array([3; 32]), 500)),
        ]);

        let found = selectors.token_account(&owner, &mint);
        assert_eq!((*found).as_ref().map(|(address, _)| *address), Some(Pubkey::new_from_array([11; 32])));
    }

    #[test]
    fn test_pools_with_mint() {
        let (stores, selectors) = setup();
        let mint = Pubkey::new_from_array([7; 32]);
        stores.pools.upsert([
            (Pubkey::new_from_array([20; 32]), sample_pool(&[mint, Pubkey::new_from_array([8; 32])], PoolState::Initialized)),
            (Pubkey::new_from_array([21; 32]), sample_pool(&[Pubkey::new_from_array([8; 32])], PoolState::Initialized)),
        ]);
        let pools = selectors.pools_with_mint(&mint);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].0, Pubkey::new_from_array([20; 32]));
    }

    #[test]
    fn test_portfolio_value() {
        let (stores, selectors) = setup();
        let owner = Pubkey::new_from_array([1; 32]);
        let usdc = Pubkey::new_from_array([2; 32]);
        let unknown = Pubkey::new_from_array([3; 32]);
        stores.mints.insert_missing([(usdc, Arc::new(MintMetadata::new(usdc, 6)))]);
        stores.prices.set(usdc, 2.0);
        stores.token_accounts.upsert([
            (Pubkey::new_from_array([10; 32]), token_account(usdc, owner, 1_500_000)),
            (Pubkey::new_from_array([11; 32]), token_account(unknown, owner, 9)),
        ]);

        assert_eq!(*selectors.portfolio_value(&owner), 3.0);
        stores.prices.set(usdc, 4.0);
        assert_eq!(*selectors.portfolio_value(&owner), 6.0);

        stores.balances.upsert_one(owner, 2 * LAMPORTS_PER_SOL);
        stores.prices.set(WRAPPED_SOL_MINT.parse().unwrap(), 10.0);
        assert_eq!(selectors.wallet_balance_sol(&owner), Some(2.0));
        assert_eq!(*selectors.portfolio_value(&owner), 26.0);
    }

    #[test]
    fn test_expired_prices_are_not_served_from_memo() {
        let stores = AppStores::shared(Duration::from_millis(20));
        let selectors = Selectors::new(stores.clone());
        let owner = Pubkey::new_from_array([1; 32]);
        let usdc = Pubkey::new_from_array([2; 32]);
        stores.mints.insert_missing([(usdc, Arc::new(MintMetadata::new(usdc, 6)))]);
        stores.token_accounts.upsert_one(Pubkey::new_from_array([10; 32]), token_account(usdc, owner, 3_000_000));
        stores.prices.set(usdc, 1.0);

        assert_eq!(*selectors.prices(&[usdc]), vec![Some(1.0)]);
        assert_eq!(*selectors.portfolio_value(&owner), 3.0);
        let version = stores.prices.version();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(stores.prices.version(), version);
        assert_eq!(*selectors.prices(&[usdc]), vec![None]);
        assert_eq!(*selectors.portfolio_value(&owner), 0.0);

        stores.prices.set(usdc, 2.0);
        assert_eq!(*selectors.prices(&[usdc]), vec![Some(2.0)]);
    }

    #[test]
    fn test_memo_without_deadline_stays_cached() {
        let memo: Memo<u8, u32> = Memo::new();
        let first = memo.get_or_compute(&[1], &0, || 5);
        let second = memo.get_or_compute(&[1], &0, || 6);
        assert!(Arc::ptr_eq(&first, &second));

        let lapsed = memo.get_or_compute_until(&[1], &0, || (7, Some(Instant::now())));
        assert_eq!(*lapsed, 7);
        assert_eq!(*memo.get_or_compute(&[1], &0, || 8), 8);
    }
}
