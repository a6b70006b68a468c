use crate::accounts::{
    AccountDecoder, DecodeError, PoolData, PoolDecoder, TOKEN_ACCOUNT_LEN, TOKEN_ACCOUNT_OWNER_OFFSET, TokenAccount,
    TokenAccountDecoder,
};
use crate::data_sync::coordinator::{PushUpdate, SyncDomain};
use crate::data_sync::rpc::{AccountReader, memcmp_address};
use crate::data_sync::websocket::{PushEvent, SubscriptionRequest};
use crate::store::{AppStores, BalanceStore, PoolStore, TokenAccountStore};
use crate::utils::address::Pubkey;
use async_trait::async_trait;
use eyre::Result;
use solana_client::rpc_filter::RpcFilterType;
use std::sync::Arc;
use tracing::debug;

/// Lamports of the connected wallet.
pub struct WalletBalanceDomain {
    stores: Arc<AppStores>,
    reader: Arc<dyn AccountReader>,
}

impl WalletBalanceDomain {
    pub fn new(stores: Arc<AppStores>, reader: Arc<dyn AccountReader>) -> Self {
        Self { stores, reader }
    }
}

#[async_trait]
impl SyncDomain for WalletBalanceDomain {
    type Scope = Pubkey;
    type Key = Pubkey;
    type Value = u64;

    const CLEAR_ON_DEACTIVATE: bool = true;

    fn name(&self) -> &'static str {
        "wallet_balance"
    }

    fn store(&self) -> &BalanceStore {
        &self.stores.balances
    }

    fn subscription(&self, wallet: &Pubkey) -> SubscriptionRequest {
        SubscriptionRequest::Account { address: *wallet }
    }

    async fn fetch_all(&self, wallet: &Pubkey) -> Result<Vec<(Pubkey, u64)>> {
        let lamports = self.reader.get_balance(wallet).await?;
        Ok(vec![(*wallet, lamports)])
    }

    fn decode_push(&self, wallet: &Pubkey, event: &PushEvent) -> Result<PushUpdate<Pubkey, u64>, DecodeError> {
        Ok(PushUpdate::Upsert(*wallet, event.account.lamports))
    }
}

/// SPL token accounts owned by the connected wallet.
pub struct TokenAccountDomain {
    stores: Arc<AppStores>,
    reader: Arc<dyn AccountReader>,
    token_program: Pubkey,
    decoder: TokenAccountDecoder,
}

impl TokenAccountDomain {
    pub fn new(stores: Arc<AppStores>, reader: Arc<dyn AccountReader>, token_program: Pubkey) -> Self {
        Self { stores, reader, token_program, decoder: TokenAccountDecoder }
    }

    pub fn filters(owner: &Pubkey) -> Vec<RpcFilterType> {
        vec![RpcFilterType::DataSize(TOKEN_ACCOUNT_LEN as u64), memcmp_address(TOKEN_ACCOUNT_OWNER_OFFSET, owner)]
    }
}

#[async_trait]
impl SyncDomain for TokenAccountDomain {
    type Scope = Pubkey;
    type Key = Pubkey;
    type Value = TokenAccount;

    const CLEAR_ON_DEACTIVATE: bool = true;

    fn name(&self) -> &'static str {
        "token_accounts"
    }

    fn store(&self) -> &TokenAccountStore {
        &self.stores.token_accounts
    }

    fn subscription(&self, owner: &Pubkey) -> SubscriptionRequest {
        SubscriptionRequest::Program { program_id: self.token_program, filters: Self::filters(owner) }
    }

    async fn fetch_all(&self, owner: &Pubkey) -> Result<Vec<(Pubkey, TokenAccount)>> {
        let raw = self.reader.get_program_accounts(&self.token_program, &Self::filters(owner)).await?;
        let accounts = raw
            .into_iter()
            .filter_map(|(address, account)| match self.decoder.decode(&account.data) {
                Ok(decoded) if decoded.owner == *owner => Some((address, decoded)),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping token account {}: {}", address, e);
                    None
                }
            })
            .collect();
        Ok(accounts)
    }

    fn decode_push(&self, owner: &Pubkey, event: &PushEvent) -> Result<PushUpdate<Pubkey, TokenAccount>, DecodeError> {
        let account = self.decoder.decode(&event.account.data)?;
        if account.owner != *owner {
            return Err(DecodeError::Layout(format!("token account owned by {}", account.owner)));
        }
        Ok(PushUpdate::Upsert(event.address, account))
    }
}

/// Every pool of the pool program. Pools in the Deleted state never reach
/// the store; a push that deletes a pool removes it.
pub struct PoolDomain {
    stores: Arc<AppStores>,
    reader: Arc<dyn AccountReader>,
    pool_program: Pubkey,
    decoder: PoolDecoder,
}

impl PoolDomain {
    pub fn new(stores: Arc<AppStores>, reader: Arc<dyn AccountReader>, pool_program: Pubkey) -> Self {
        Self { stores, reader, pool_program, decoder: PoolDecoder::default() }
    }
}

#[async_trait]
impl SyncDomain for PoolDomain {
    type Scope = ();
    type Key = Pubkey;
    type Value = PoolData;

    fn name(&self) -> &'static str {
        "pools"
    }

    fn store(&self) -> &PoolStore {
        &self.stores.pools
    }

    fn subscription(&self, _: &()) -> SubscriptionRequest {
        SubscriptionRequest::Program { program_id: self.pool_program, filters: Vec::new() }
    }

    async fn fetch_all(&self, _: &()) -> Result<Vec<(Pubkey, PoolData)>> {
        let raw = self.reader.get_program_accounts(&self.pool_program, &[]).await?;
        let pools = raw
            .into_iter()
            .filter_map(|(address, account)| match self.decoder.decode(&account.data) {
                Ok(pool) if pool.is_deleted() => None,
                Ok(pool) => Some((address, pool)),
                Err(e) => {
                    debug!("Skipping pool account {}: {}", address, e);
                    None
                }
            })
            .collect();
        Ok(pools)
    }

    fn decode_push(&self, _: &(), event: &PushEvent) -> Result<PushUpdate<Pubkey, PoolData>, DecodeError> {
        let pool = self.decoder.decode(&event.account.data)?;
        if pool.is_deleted() {
            Ok(PushUpdate::Remove(event.address))
        } else {
            Ok(PushUpdate::Upsert(event.address, pool))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::PoolState;
    use crate::accounts::pool::tests::sample_pool;
    use crate::accounts::{pack_token_account, token_account};
    use crate::data_sync::rpc::filter_matches;
    use solana_sdk::account::Account;

    struct StaticReader {
        accounts: Vec<(Pubkey, Account)>,
    }

    #[async_trait]
    impl AccountReader for StaticReader {
        async fn get_balance(&self, _address: &Pubkey) -> Result<u64> {
            Ok(7)
        }

        async fn get_program_accounts(&self, _program_id: &Pubkey, filters: &[RpcFilterType]) -> Result<Vec<(Pubkey, Account)>> {
            Ok(self
                .accounts
                .iter()
                .filter(|(_, account)| filters.iter().all(|f| filter_matches(f, &account.data)))
                .cloned()
                .collect())
        }
    }

    fn raw(owner: Pubkey, data: Vec<u8>) -> Account {
        Account { lamports: 1, owner, data, ..Account::default() }
    }

    #[tokio::test]
    async fn test_pool_bulk_excludes_deleted() {
        let program = Pubkey::new_from_array([0x50; 32]);
        let live = sample_pool(&[Pubkey::new_from_array([1; 32])], PoolState::Initialized);
        let deleted = sample_pool(&[Pubkey::new_from_array([2; 32])], PoolState::Deleted);
        let reader = StaticReader {
            accounts: vec![
                (Pubkey::new_from_array([10; 32]), raw(program, live.pack().unwrap())),
                (Pubkey::new_from_array([11; 32]), raw(program, deleted.pack().unwrap())),
                (Pubkey::new_from_array([12; 32]), raw(program, vec![1, 2, 3])),
            ],
        };
        let domain = PoolDomain::new(AppStores::shared(std::time::Duration::from_secs(60)), Arc::new(reader), program);

        let pools = domain.fetch_all(&()).await.unwrap();
        assert_eq!(pools, vec![(Pubkey::new_from_array([10; 32]), live)]);
    }

    #[test]
    fn test_pool_push_deleted_removes() {
        let program = Pubkey::new_from_array([0x50; 32]);
        let domain = PoolDomain::new(AppStores::shared(std::time::Duration::from_secs(60)), Arc::new(StaticReader { accounts: vec![] }), program);
        let deleted = sample_pool(&[Pubkey::new_from_array([2; 32])], PoolState::Deleted);
        let event = PushEvent { address: Pubkey::new_from_array([11; 32]), account: raw(program, deleted.pack().unwrap()), slot: 3 };

        assert_eq!(domain.decode_push(&(), &event).unwrap(), PushUpdate::Remove(Pubkey::new_from_array([11; 32])));
    }

    #[tokio::test]
    async fn test_token_accounts_filtered_by_owner() {
        let program = Pubkey::new_from_array([0x70; 32]);
        let owner = Pubkey::new_from_array([1; 32]);
        let mine = token_account(Pubkey::new_from_array([5; 32]), owner, 100);
        let theirs = token_account(Pubkey::new_from_array([5; 32]), Pubkey::new_from_array([2; 32]), 200);
        let reader = StaticReader {
            accounts: vec![
                (Pubkey::new_from_array([20; 32]), raw(program, pack_token_account(&mine))),
                (Pubkey::new_from_array([21; 32]), raw(program, pack_token_account(&theirs))),
            ],
        };
        let domain = TokenAccountDomain::new(AppStores::shared(std::time::Duration::from_secs(60)), Arc::new(reader), program);

        let accounts = domain.fetch_all(&owner).await.unwrap();
        assert_eq!(accounts, vec![(Pubkey::new_from_array([20; 32]), mine)]);

        let event = PushEvent { address: Pubkey::new_from_array([21; 32]), account: raw(program, pack_token_account(&theirs)), slot: 1 };
        assert!(domain.decode_push(&owner, &event).is_err());
        assert!(domain.subscription(&owner) == SubscriptionRequest::Program { program_id: program, filters: TokenAccountDomain::filters(&owner) });
    }

    #[tokio::test]
    async fn test_wallet_balance_domain() {
        let wallet = Pubkey::new_from_array([3; 32]);
        let domain = WalletBalanceDomain::new(AppStores::shared(std::time::Duration::from_secs(60)), Arc::new(StaticReader { accounts: vec![] }));
        assert_eq!(domain.fetch_all(&wallet).await.unwrap(), vec![(wallet, 7)]);

        let event = PushEvent { address: wallet, account: raw(Pubkey::default(), vec![]), slot: 1 };
        assert_eq!(domain.decode_push(&wallet, &event).unwrap(), PushUpdate::Upsert(wallet, 1));
    }
}
