use super::{AccountDecoder, DecodeError};
use crate::utils::address::Pubkey;
use solana_sdk::program_pack::Pack;

pub use spl_token::state::{Account as TokenAccount, AccountState as TokenAccountState};

pub const TOKEN_ACCOUNT_LEN: usize = TokenAccount::LEN;

/// Byte offset of the owner field, used as the memcmp filter for
/// "accounts owned by wallet".
pub const TOKEN_ACCOUNT_OWNER_OFFSET: usize = 32;

/// An initialized account holding `amount` of `mint` for `owner`.
pub fn token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> TokenAccount {
    TokenAccount { mint, owner, amount, state: TokenAccountState::Initialized, ..TokenAccount::default() }
}

/// Encode into the 165-byte SPL layout.
pub fn pack_token_account(account: &TokenAccount) -> Vec<u8> {
    let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
    TokenAccount::pack_into_slice(account, &mut data);
    data
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAccountDecoder;

impl AccountDecoder for TokenAccountDecoder {
    type Account = TokenAccount;

    fn decode(&self, data: &[u8]) -> Result<TokenAccount, DecodeError> {
        if data.len() < TOKEN_ACCOUNT_LEN {
            return Err(DecodeError::TooShort { expected: TOKEN_ACCOUNT_LEN, actual: data.len() });
        }
        // Token-2022 accounts carry extensions after the base layout.
        TokenAccount::unpack(&data[..TOKEN_ACCOUNT_LEN]).map_err(|e| DecodeError::Layout(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::program_option::COption;

    #[test]
    fn test_decode_packed_account() {
        let mut account = token_account(Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]), 5_000);
        account.delegate = COption::Some(Pubkey::new_from_array([3; 32]));
        account.delegated_amount = 10;
        account.is_native = COption::Some(2_039_280);

        let decoded = TokenAccountDecoder.decode(&pack_token_account(&account)).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_owner_offset_matches_layout() {
        let account = token_account(Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([9; 32]), 0);
        let data = pack_token_account(&account);
        assert_eq!(&data[TOKEN_ACCOUNT_OWNER_OFFSET..TOKEN_ACCOUNT_OWNER_OFFSET + 32], &[9u8; 32]);
    }

    #[test]
    fn test_rejects_short_or_uninitialized_data() {
        assert_eq!(TokenAccountDecoder.decode(&[0u8; 10]), Err(DecodeError::TooShort { expected: 165, actual: 10 }));

        let mut data =
            pack_token_account(&token_account(Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]), 1));
        data[108] = 0;
        assert!(TokenAccountDecoder.decode(&data).is_err());
        data[108] = 7;
        assert!(TokenAccountDecoder.decode(&data).is_err());
    }

    #[test]
    fn test_ignores_trailing_extension_bytes() {
        let account = token_account(Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]), 42);
        let mut data = pack_token_account(&account);
        data.extend_from_slice(&[0u8; 12]);
        assert_eq!(TokenAccountDecoder.decode(&data).unwrap().amount, 42);
    }
}
