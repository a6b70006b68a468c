pub use solana_sdk::pubkey::{ParsePubkeyError, Pubkey};
use std::str::FromStr;

/// Parses a base58 key, ignoring surrounding whitespace from pasted input.
pub fn parse_pubkey(input: &str) -> Result<Pubkey, ParsePubkeyError> {
    Pubkey::from_str(input.trim())
}

/// Returns true if `input` is a well-formed address. Used by form inputs to
/// disable actions instead of failing later.
pub fn is_valid_address(input: &str) -> bool {
    parse_pubkey(input).is_ok()
}

/// SPL uses the all-zero key as "no address".
pub fn is_unset(key: &Pubkey) -> bool {
    *key == Pubkey::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_parse_trims_pasted_input() {
        let key = parse_pubkey(&format!("  {}\n", USDC)).unwrap();
        assert_eq!(key.to_string(), USDC);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(parse_pubkey("0OIl"), Err(ParsePubkeyError::Invalid)));
        assert!(parse_pubkey("abc").is_err());
        assert!(!is_valid_address(""));
        assert!(is_valid_address(USDC));
    }

    #[test]
    fn test_unset_key() {
        assert!(is_unset(&Pubkey::default()));
        assert!(!is_unset(&Pubkey::new_from_array([1; 32])));
    }
}
