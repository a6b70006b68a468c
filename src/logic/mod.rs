/// Logic Layer
///
/// Everything computed from the stores rather than fetched:
/// - memoized selectors over the keyed stores
/// - debounced swap quoting and the swap form feeding it
/// - the persisted bulk-sender draft
/// - academy page filtering

pub mod academy;
pub mod bulk_sender;
pub mod quote;
pub mod selectors;
pub mod swap_form;

pub use academy::{OTHERS_TAG, Page, RECOGNIZED_TAGS, available_tags, filter_pages};
pub use bulk_sender::{BulkSender, BulkSenderDraft, RowError};
pub use quote::{JupiterAggregator, Quote, QuoteAggregator, QuoteEngine, QuoteInput, QuoteOutcome, QuoteRequest, QuoteState, RouteHop};
pub use selectors::{Memo, Selectors};
pub use swap_form::{SwapForm, SwapFormStore};
