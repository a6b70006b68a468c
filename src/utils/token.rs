use crate::utils::address::Pubkey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Token-list entry for a mint. Entries are inserted once and never updated
/// in place.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintMetadata {
    #[serde_as(as = "DisplayFromStr")]
    pub address: Pubkey,
    #[serde(default)]
    pub chain_id: u64,
    pub decimals: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extensions: Value,
}

pub type MintMetadataWrapper = Arc<MintMetadata>;

impl Hash for MintMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl PartialEq for MintMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for MintMetadata {}

impl Ord for MintMetadata {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl PartialOrd for MintMetadata {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl MintMetadata {
    pub fn new(address: Pubkey, decimals: u8) -> Self {
        Self {
            address,
            chain_id: crate::utils::constants::MAINNET_CHAIN_ID,
            decimals,
            name: String::new(),
            symbol: String::new(),
            logo_uri: None,
            tags: Vec::new(),
            extensions: Value::Null,
        }
    }

    pub fn with_symbol(mut self, symbol: &str, name: &str) -> Self {
        self.symbol = symbol.to_string();
        self.name = name.to_string();
        self
    }

    /// Symbol, falling back to a shortened address for unlabelled mints.
    pub fn display_symbol(&self) -> String {
        if !self.symbol.is_empty() {
            return self.symbol.clone();
        }
        let address = self.address.to_string();
        format!("{}...", &address[..address.len().min(4)])
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_token_list_entry() {
        let json = r#"{
            "address": "So11111111111111111111111111111111111111112",
            "chainId": 101,
            "decimals": 9,
            "name": "Wrapped SOL",
            "symbol": "SOL",
            "logoURI": "https://example.invalid/sol.png",
            "tags": ["old-registry"],
            "extensions": {"coingeckoId": "wrapped-solana"}
        }"#;
        let mint: MintMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(mint.decimals, 9);
        assert_eq!(mint.symbol, "SOL");
        assert_eq!(mint.logo_uri.as_deref(), Some("https://example.invalid/sol.png"));
        assert!(mint.has_tag("old-registry"));
        assert_eq!(mint.extensions["coingeckoId"], "wrapped-solana");
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{"address": "So11111111111111111111111111111111111111112", "decimals": 9}"#;
        let mint: MintMetadata = serde_json::from_str(json).unwrap();
        assert!(mint.tags.is_empty());
        assert!(mint.extensions.is_null());
        assert_eq!(mint.display_symbol(), "So11...");
    }

    #[test]
    fn test_equality_by_address() {
        let a = MintMetadata::new(Pubkey::new_from_array([1; 32]), 6).with_symbol("A", "Token A");
        let b = MintMetadata::new(Pubkey::new_from_array([1; 32]), 9);
        assert_eq!(a, b);
    }
}
