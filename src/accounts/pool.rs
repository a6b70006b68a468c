use super::{AccountDecoder, DecodeError};
use crate::utils::address::Pubkey;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_sdk::hash::hashv;
use strum_macros::Display;

pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum PoolState {
    Uninitialized,
    Initialized,
    Frozen,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum MintActionState {
    Active,
    BidOnly,
    AskOnly,
    Paused,
}

/// Weighted multi-token liquidity pool account.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PoolData {
    pub authority: Pubkey,
    pub fee: u64,
    pub tax_fee: u64,
    pub state: PoolState,
    pub mint_lpt: Pubkey,
    pub tax_man: Pubkey,
    pub mints: Vec<Pubkey>,
    pub actions: Vec<MintActionState>,
    pub treasuries: Vec<Pubkey>,
    pub reserves: Vec<u64>,
    pub weights: Vec<u64>,
}

impl PoolData {
    pub fn is_deleted(&self) -> bool {
        self.state == PoolState::Deleted
    }

    pub fn contains_mint(&self, mint: &Pubkey) -> bool {
        self.mints.contains(mint)
    }

    pub fn reserve_of(&self, mint: &Pubkey) -> Option<u64> {
        let idx = self.mints.iter().position(|m| m == mint)?;
        self.reserves.get(idx).copied()
    }

    /// Encode as an account body including the discriminator.
    pub fn pack(&self) -> Result<Vec<u8>, DecodeError> {
        let mut data = pool_discriminator().to_vec();
        let body = borsh::to_vec(self).map_err(|e| DecodeError::Layout(e.to_string()))?;
        data.extend(body);
        Ok(data)
    }
}

/// First 8 bytes of sha256("account:<Name>"), the account-type prefix used by
/// Anchor programs.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = hashv(&[b"account:", name.as_bytes()]).to_bytes();
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

pub fn pool_discriminator() -> [u8; DISCRIMINATOR_LEN] {
    account_discriminator("Pool")
}

#[derive(Debug, Clone, Copy)]
pub struct PoolDecoder {
    discriminator: [u8; DISCRIMINATOR_LEN],
}

impl Default for PoolDecoder {
    fn default() -> Self {
        Self { discriminator: pool_discriminator() }
    }
}

impl AccountDecoder for PoolDecoder {
    type Account = PoolData;

    fn decode(&self, data: &[u8]) -> Result<PoolData, DecodeError> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(DecodeError::TooShort { expected: DISCRIMINATOR_LEN, actual: data.len() });
        }
        if data[..DISCRIMINATOR_LEN] != self.discriminator {
            return Err(DecodeError::Discriminator);
        }
        // trailing bytes are account padding
        let mut body = &data[DISCRIMINATOR_LEN..];
        <PoolData as BorshDeserialize>::deserialize(&mut body).map_err(|e| DecodeError::Layout(e.to_string()))
    }
}
