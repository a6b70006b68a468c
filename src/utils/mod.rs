pub mod address;
pub mod amount;
pub mod config_loader;
pub mod constants;
pub mod notify;
pub mod token;

pub use address::{ParsePubkeyError, Pubkey, is_unset, is_valid_address, parse_pubkey};
pub use amount::{format_decimal_amount, parse_decimal_amount, to_ui_amount};
pub use config_loader::*;
pub use constants::*;
pub use notify::{Notification, NotificationCenter, NotificationKind, run_user_action};
pub use token::{MintMetadata, MintMetadataWrapper};
