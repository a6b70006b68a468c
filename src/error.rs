use crate::store::StorageError;
use crate::utils::address::ParsePubkeyError;
use crate::utils::config_loader::LoadConfigError;
use eyre::Report;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync service not started")]
    NotStarted,
    #[error("sync service already started")]
    AlreadyStarted,
    #[error("no wallet connected")]
    WalletNotConnected,
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] ParsePubkeyError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Config(#[from] LoadConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    InternalEyre(Report),
}

impl From<Report> for SyncError {
    fn from(report: Report) -> Self {
        Self::InternalEyre(report)
    }
}
