//! On-chain account layouts consumed by the sync layer.

pub mod pool;
pub mod token_account;

pub use pool::{MintActionState, PoolData, PoolDecoder, PoolState};
pub use token_account::{
    TOKEN_ACCOUNT_LEN, TOKEN_ACCOUNT_OWNER_OFFSET, TokenAccount, TokenAccountDecoder, TokenAccountState, pack_token_account,
    token_account,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("account data too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("account discriminator mismatch")]
    Discriminator,
    #[error("invalid account layout: {0}")]
    Layout(String),
}

/// Decodes raw account bytes into a typed account.
pub trait AccountDecoder: Send + Sync {
    type Account;

    fn decode(&self, data: &[u8]) -> Result<Self::Account, DecodeError>;
}
