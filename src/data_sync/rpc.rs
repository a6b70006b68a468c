use crate::accounts::{AccountDecoder, TokenAccountDecoder};
use crate::utils::address::Pubkey;
use async_trait::async_trait;
use eyre::{Result, eyre};
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;
use tracing::debug;

/// Matches accounts whose data holds `address` at `offset`.
pub fn memcmp_address(offset: usize, address: &Pubkey) -> RpcFilterType {
    RpcFilterType::Memcmp(Memcmp::new_base58_encoded(offset, address.as_ref()))
}

/// Local evaluation of a server-side filter, same semantics as the node applies.
pub fn filter_matches(filter: &RpcFilterType, data: &[u8]) -> bool {
    match filter {
        RpcFilterType::DataSize(size) => data.len() as u64 == *size,
        RpcFilterType::Memcmp(memcmp) => memcmp.bytes_match(data),
        RpcFilterType::TokenAccountState => TokenAccountDecoder.decode(data).is_ok(),
    }
}

/// Bulk reads used by coordinators before they switch to pushes.
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    async fn get_program_accounts(&self, program_id: &Pubkey, filters: &[RpcFilterType]) -> Result<Vec<(Pubkey, Account)>>;
}

/// Account reader over the Solana JSON-RPC client, at confirmed commitment.
pub struct RpcClient {
    client: SolanaRpcClient,
}

impl RpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> Self {
        let client = SolanaRpcClient::new_with_timeout_and_commitment(rpc_url, timeout, CommitmentConfig::confirmed());
        Self { client }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Lamports held by `address`.
    pub async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.client
            .get_balance(address)
            .await
            .map_err(|e| eyre!("getBalance {} failed: {}", address, e))
    }

    /// All accounts owned by `program_id` that pass `filters`.
    pub async fn get_program_accounts(&self, program_id: &Pubkey, filters: &[RpcFilterType]) -> Result<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: (!filters.is_empty()).then(|| filters.to_vec()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.client.commitment()),
                ..Default::default()
            },
            ..Default::default()
        };
        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await
            .map_err(|e| eyre!("getProgramAccounts {} failed: {}", program_id, e))?;
        debug!("getProgramAccounts {} returned {} accounts", program_id, accounts.len());
        Ok(accounts)
    }
}

#[async_trait]
impl AccountReader for RpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        RpcClient::get_balance(self, address).await
    }

    async fn get_program_accounts(&self, program_id: &Pubkey, filters: &[RpcFilterType]) -> Result<Vec<(Pubkey, Account)>> {
        RpcClient::get_program_accounts(self, program_id, filters).await
    }
}
