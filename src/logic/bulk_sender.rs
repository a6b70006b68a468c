use crate::store::{LocalStorage, StorageError};
use crate::utils::address::is_valid_address;
use crate::utils::amount::{format_decimal_amount, parse_decimal_amount};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const BULK_SENDER_NAMESPACE: &str = "bulk_sender";
const KEY_MINT_ADDRESS: &str = "mintAddress";
const KEY_DATA: &str = "data";
const KEY_DECIMALIZED: &str = "decimalized";

/// Draft of a one-mint airdrop. Rows are `[recipient, amount]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSenderDraft {
    pub mint_address: String,
    pub rows: Vec<Vec<String>>,
    pub decimalized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row must have a recipient and an amount")]
    Shape,
    #[error("invalid recipient address")]
    Pubkey,
    #[error("invalid amount")]
    Amount,
}

impl BulkSenderDraft {
    /// Amount of a row in base units. With `decimalized` the amount is typed
    /// in whole-token units and scaled by `decimals`.
    fn row_units(&self, row: &[String], decimals: u8) -> Result<u64, RowError> {
        let [address, amount] = row else {
            return Err(RowError::Shape);
        };
        if !is_valid_address(address) {
            return Err(RowError::Pubkey);
        }
        let units = if self.decimalized { parse_decimal_amount(amount, decimals) } else { amount.trim().parse().ok() };
        units.filter(|units| *units > 0).ok_or(RowError::Amount)
    }

    fn format_units(&self, units: u64, decimals: u8) -> String {
        if self.decimalized { format_decimal_amount(units, decimals) } else { units.to_string() }
    }

    /// Per-row validation, in row order.
    pub fn validate(&self, decimals: u8) -> Vec<Result<u64, RowError>> {
        self.rows.iter().map(|row| self.row_units(row, decimals)).collect()
    }

    pub fn is_valid(&self, decimals: u8) -> bool {
        is_valid_address(&self.mint_address)
            && !self.rows.is_empty()
            && self.validate(decimals).iter().all(Result::is_ok)
    }

    /// Total to send in base units, if every row is valid.
    pub fn total(&self, decimals: u8) -> Option<u64> {
        self.validate(decimals).into_iter().try_fold(0u64, |acc, row| acc.checked_add(row.ok()?))
    }

    /// Collapse rows with the same recipient, summing amounts. Invalid rows
    /// are kept as they are. Returns how many rows were folded away.
    fn merge_duplicates(&mut self, decimals: u8) -> usize {
        let before = self.rows.len();
        let mut merged: Vec<Vec<String>> = Vec::with_capacity(before);
        let mut sums: Vec<(String, usize, u64)> = Vec::new();

        for row in self.rows.iter() {
            match self.row_units(row, decimals) {
                Ok(units) => {
                    let address = row[0].trim().to_string();
                    match sums.iter_mut().find(|(seen, _, _)| *seen == address) {
                        Some((_, _, total)) => *total = total.saturating_add(units),
                        None => {
                            sums.push((address.clone(), merged.len(), units));
                            merged.push(vec![address, String::new()]);
                        }
                    }
                }
                Err(_) => merged.push(row.clone()),
            }
        }
        for (_, index, total) in sums {
            merged[index][1] = self.format_units(total, decimals);
        }

        self.rows = merged;
        before - self.rows.len()
    }
}

/// Bulk-sender draft persisted under the `bulk_sender` namespace; every edit
/// is written through.
pub struct BulkSender {
    storage: LocalStorage,
    draft: RwLock<BulkSenderDraft>,
}

impl BulkSender {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage, draft: RwLock::new(BulkSenderDraft::default()) }
    }

    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self::new(LocalStorage::new(dir, BULK_SENDER_NAMESPACE))
    }

    /// Load the last persisted draft, if any.
    pub fn restore(&self) -> Result<BulkSenderDraft, StorageError> {
        let draft = BulkSenderDraft {
            mint_address: self.storage.get(KEY_MINT_ADDRESS)?.unwrap_or_default(),
            rows: self.storage.get(KEY_DATA)?.unwrap_or_default(),
            decimalized: self.storage.get(KEY_DECIMALIZED)?.unwrap_or_default(),
        };
        info!("Restored bulk sender draft with {} rows", draft.rows.len());
        *self.draft.write() = draft.clone();
        Ok(draft)
    }

    pub fn draft(&self) -> BulkSenderDraft {
        self.draft.read().clone()
    }

    pub fn set_mint(&self, mint_address: &str) -> Result<(), StorageError> {
        self.edit(|draft| draft.mint_address = mint_address.trim().to_string())
    }

    pub fn add_row(&self, address: &str, amount: &str) -> Result<(), StorageError> {
        self.edit(|draft| draft.rows.push(vec![address.trim().to_string(), amount.trim().to_string()]))
    }

    pub fn remove_row(&self, index: usize) -> Result<(), StorageError> {
        self.edit(|draft| {
            if index < draft.rows.len() {
                draft.rows.remove(index);
            }
        })
    }

    pub fn set_rows(&self, rows: Vec<Vec<String>>) -> Result<(), StorageError> {
        self.edit(|draft| draft.rows = rows)
    }

    pub fn set_decimalized(&self, decimalized: bool) -> Result<(), StorageError> {
        self.edit(|draft| draft.decimalized = decimalized)
    }

    pub fn merge_duplicates(&self, decimals: u8) -> Result<usize, StorageError> {
        let mut folded = 0;
        self.edit(|draft| folded = draft.merge_duplicates(decimals))?;
        debug!("Merged {} duplicate bulk sender rows", folded);
        Ok(folded)
    }

    /// Drop the draft, in memory and on disk.
    pub fn clear(&self) -> Result<(), StorageError> {
        *self.draft.write() = BulkSenderDraft::default();
        self.storage.clear()
    }

    fn edit(&self, change: impl FnOnce(&mut BulkSenderDraft)) -> Result<(), StorageError> {
        let mut draft = self.draft.write();
        change(&mut draft);
        self.storage.set(KEY_MINT_ADDRESS, &draft.mint_address)?;
        self.storage.set(KEY_DATA, &draft.rows)?;
        self.storage.set(KEY_DECIMALIZED, &draft.decimalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address::Pubkey;

    fn row(address: &Pubkey, amount: &str) -> Vec<String> {
        vec![address.to_string(), amount.to_string()]
    }

    #[test]
    fn test_edits_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mint = Pubkey::new_from_array([1; 32]).to_string();
        {
            let sender = BulkSender::open(dir.path());
            sender.set_mint(&mint).unwrap();
            sender.add_row(&Pubkey::new_from_array([2; 32]).to_string(), "1.5").unwrap();
            sender.set_decimalized(true).unwrap();
        }

        let sender = BulkSender::open(dir.path());
        let draft = sender.restore().unwrap();
        assert_eq!(draft.mint_address, mint);
        assert_eq!(draft.rows, vec![row(&Pubkey::new_from_array([2; 32]), "1.5")]);
        assert!(draft.decimalized);
        assert_eq!(sender.draft(), draft);
    }

    #[test]
    fn test_restore_without_saved_draft() {
        let dir = tempfile::tempdir().unwrap();
        let sender = BulkSender::open(dir.path());
        assert_eq!(sender.restore().unwrap(), BulkSenderDraft::default());
    }

    #[test]
    fn test_validation() {
        let draft = BulkSenderDraft {
            mint_address: Pubkey::new_from_array([1; 32]).to_string(),
            rows: vec![row(&Pubkey::new_from_array([2; 32]), "10"), vec!["nope".to_string(), "1".to_string()], row(&Pubkey::new_from_array([3; 32]), "0")],
            decimalized: false,
        };
        assert_eq!(draft.validate(6), vec![Ok(10), Err(RowError::Pubkey), Err(RowError::Amount)]);
        assert!(!draft.is_valid(6));
        assert_eq!(draft.total(6), None);

        let draft = BulkSenderDraft { rows: vec![row(&Pubkey::new_from_array([2; 32]), "1.25")], decimalized: true, ..draft };
        assert!(draft.is_valid(2));
        assert_eq!(draft.total(2), Some(125));
    }

    #[test]
    fn test_merge_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let sender = BulkSender::open(dir.path());
        let alice = Pubkey::new_from_array([2; 32]);
        let bob = Pubkey::new_from_array([3; 32]);
        sender
            .set_rows(vec![row(&alice, "1.5"), row(&bob, "2"), row(&alice, "0.25"), vec!["bad".to_string(), "1".to_string()]])
            .unwrap();
        sender.set_decimalized(true).unwrap();

        assert_eq!(sender.merge_duplicates(6).unwrap(), 1);
        let rows = sender.draft().rows;
        assert_eq!(rows[0], row(&alice, "1.75"));
        assert_eq!(rows[1], row(&bob, "2"));
        assert_eq!(rows[2], vec!["bad".to_string(), "1".to_string()]);

        sender.clear().unwrap();
        assert!(sender.restore().unwrap().rows.is_empty());
    }
}
