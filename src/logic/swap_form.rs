use crate::logic::quote::{QuoteEngine, QuoteInput, QuoteState};
use crate::store::AppStores;
use crate::utils::address::Pubkey;
use crate::utils::amount::{format_decimal_amount, parse_decimal_amount};
use parking_lot::RwLock;
use std::sync::Arc;

pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;

/// Session-scoped swap form. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapForm {
    pub bid_mint: Option<Pubkey>,
    pub ask_mint: Option<Pubkey>,
    pub bid_amount: String,
    pub ask_amount: String,
    pub slippage_bps: u16,
}

impl Default for SwapForm {
    fn default() -> Self {
        Self { bid_mint: None, ask_mint: None, bid_amount: String::new(), ask_amount: String::new(), slippage_bps: DEFAULT_SLIPPAGE_BPS }
    }
}

/// Swap form state wired to the quote engine: every edit that can change the
/// route re-submits to the engine.
pub struct SwapFormStore {
    form: RwLock<SwapForm>,
    stores: Arc<AppStores>,
    engine: Arc<QuoteEngine>,
}

impl SwapFormStore {
    pub fn new(stores: Arc<AppStores>, engine: Arc<QuoteEngine>) -> Self {
        Self { form: RwLock::new(SwapForm::default()), stores, engine }
    }

    pub fn form(&self) -> SwapForm {
        self.form.read().clone()
    }

    pub fn quote(&self) -> QuoteState {
        self.engine.state()
    }

    pub fn set_bid_mint(&self, mint: Pubkey) {
        self.update(|form| form.bid_mint = Some(mint));
    }

    pub fn set_ask_mint(&self, mint: Pubkey) {
        self.update(|form| form.ask_mint = Some(mint));
    }

    pub fn set_bid_amount(&self, amount: &str) {
        self.update(|form| form.bid_amount = amount.trim().to_string());
    }

    pub fn set_slippage_bps(&self, slippage_bps: u16) {
        self.update(|form| form.slippage_bps = slippage_bps);
    }

    /// Swap bid and ask sides.
    pub fn switch(&self) {
        self.update(|form| {
            std::mem::swap(&mut form.bid_mint, &mut form.ask_mint);
            form.bid_amount = std::mem::take(&mut form.ask_amount);
        });
    }

    pub fn reset(&self) {
        *self.form.write() = SwapForm::default();
        self.engine.reset();
    }

    /// Copy the committed quote's output into `ask_amount`. Returns the new
    /// value.
    pub fn refresh_ask_amount(&self) -> String {
        let state = self.engine.state();
        let mut form = self.form.write();
        form.ask_amount = match (state.quote(), form.ask_mint.and_then(|mint| self.decimals(&mint))) {
            (Some(quote), Some(decimals)) => format_decimal_amount(quote.output_amount, decimals),
            _ => String::new(),
        };
        form.ask_amount.clone()
    }

    /// Bid amount in base units when parseable for the bid mint.
    pub fn bid_units(&self) -> Option<u64> {
        let form = self.form.read();
        let decimals = self.decimals(&form.bid_mint?)?;
        parse_decimal_amount(&form.bid_amount, decimals)
    }

    /// Ready to swap: both mints chosen and distinct, a positive amount not
    /// above `available`, and a settled route.
    pub fn can_submit(&self, available: Option<u64>) -> bool {
        let Some(units) = self.bid_units().filter(|units| *units > 0) else {
            return false;
        };
        if available.is_some_and(|available| units > available) {
            return false;
        }
        let form = self.form.read();
        let mints_ok = matches!((form.bid_mint, form.ask_mint), (Some(bid), Some(ask)) if bid != ask);
        let state = self.engine.state();
        mints_ok && !state.fetching && state.quote().is_some()
    }

    fn decimals(&self, mint: &Pubkey) -> Option<u8> {
        self.stores.mints.get(mint).map(|metadata| metadata.decimals)
    }

    fn update(&self, edit: impl FnOnce(&mut SwapForm)) {
        let input = {
            let mut form = self.form.write();
            edit(&mut form);
            self.quote_input(&form)
        };
        match input {
            Some(input) => self.engine.submit(&input),
            None => self.engine.reset(),
        }
    }

    fn quote_input(&self, form: &SwapForm) -> Option<QuoteInput> {
        let bid_mint = form.bid_mint?;
        Some(QuoteInput {
            bid_mint,
            ask_mint: form.ask_mint?,
            bid_amount: form.bid_amount.clone(),
            bid_decimals: self.decimals(&bid_mint)?,
            slippage_bps: form.slippage_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::quote::{Quote, QuoteAggregator, QuoteOutcome, QuoteRequest};
    use crate::utils::token::MintMetadata;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Doubler;

    #[async_trait]
    impl QuoteAggregator for Doubler {
        async fn quote(&self, request: &QuoteRequest) -> eyre::Result<Option<Quote>> {
            Ok(Some(Quote { request: request.clone(), route: vec![], output_amount: request.amount * 2, price_impact_pct: 0.0 }))
        }
    }

    fn setup() -> (SwapFormStore, Pubkey, Pubkey) {
        let stores = AppStores::shared(Duration::from_secs(60));
        let bid = Pubkey::new_from_array([1; 32]);
        let ask = Pubkey::new_from_array([2; 32]);
        stores.mints.insert_missing([(bid, Arc::new(MintMetadata::new(bid, 6))), (ask, Arc::new(MintMetadata::new(ask, 9)))]);
        let engine = Arc::new(QuoteEngine::new(Arc::new(Doubler), Duration::from_millis(300)));
        (SwapFormStore::new(stores, engine), bid, ask)
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_flow_produces_quote() {
        let (store, bid, ask) = setup();
        store.set_bid_mint(bid);
        store.set_ask_mint(ask);
        store.set_bid_amount("1.5");
        assert!(store.quote().fetching);
        assert!(!store.can_submit(None));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!store.quote().fetching);
        assert_eq!(store.refresh_ask_amount(), "0.003");
        assert!(store.can_submit(Some(2_000_000)));
        assert!(!store.can_submit(Some(1_000_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_and_reset() {
        let (store, bid, ask) = setup();
        store.set_bid_mint(bid);
        store.set_ask_mint(ask);
        store.set_bid_amount("0");
        assert_eq!(store.quote().outcome, QuoteOutcome::NoRoute);

        store.switch();
        let form = store.form();
        assert_eq!(form.bid_mint, Some(ask));
        assert_eq!(form.ask_mint, Some(bid));

        store.reset();
        assert_eq!(store.form(), SwapForm::default());
        assert!(!store.quote().fetching);
    }

    #[tokio::test]
    async fn test_unknown_mint_has_no_units() {
        let (store, bid, _) = setup();
        store.set_bid_mint(Pubkey::new_from_array([9; 32]));
        store.set_bid_amount("1");
        assert_eq!(store.bid_units(), None);
        store.set_bid_mint(bid);
        assert_eq!(store.bid_units(), Some(1_000_000));
    }
}
