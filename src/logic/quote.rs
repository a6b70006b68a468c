use crate::data_sync::config::SyncConfig;
use crate::utils::address::Pubkey;
use crate::utils::amount::parse_decimal_amount;
use async_trait::async_trait;
use eyre::{Result, eyre};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// What the user typed into the swap form.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteInput {
    pub bid_mint: Pubkey,
    pub ask_mint: Pubkey,
    pub bid_amount: String,
    pub bid_decimals: u8,
    pub slippage_bps: u16,
}

impl QuoteInput {
    /// `None` when no route can exist: empty, zero or malformed amount, or
    /// the same mint on both sides.
    pub fn to_request(&self) -> Option<QuoteRequest> {
        if self.bid_mint == self.ask_mint {
            return None;
        }
        let amount = parse_decimal_amount(&self.bid_amount, self.bid_decimals).filter(|amount| *amount > 0)?;
        Some(QuoteRequest {
            input_mint: self.bid_mint,
            output_mint: self.ask_mint,
            amount,
            slippage_bps: self.slippage_bps,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteHop {
    pub amm_key: String,
    pub label: String,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub request: QuoteRequest,
    pub route: Vec<RouteHop>,
    pub output_amount: u64,
    pub price_impact_pct: f64,
}

impl Quote {
    pub fn hops(&self) -> usize {
        self.route.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum QuoteOutcome {
    #[default]
    NoRoute,
    Route(Quote),
}

/// Observable quote state. `fetching` is set from input acceptance until the
/// current input's result is committed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteState {
    pub fetching: bool,
    pub outcome: QuoteOutcome,
}

impl QuoteState {
    pub fn quote(&self) -> Option<&Quote> {
        match &self.outcome {
            QuoteOutcome::Route(quote) => Some(quote),
            QuoteOutcome::NoRoute => None,
        }
    }
}

/// Remote route computation.
#[async_trait]
pub trait QuoteAggregator: Send + Sync {
    /// `Ok(None)` when the aggregator knows no route.
    async fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>>;
}

/// Jupiter v6 quote API.
pub struct JupiterAggregator {
    http_client: reqwest::Client,
    quote_api_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterQuote {
    out_amount: String,
    #[serde(default)]
    price_impact_pct: String,
    #[serde(default)]
    route_plan: Vec<JupiterRouteStep>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterRouteStep {
    swap_info: JupiterSwapInfo,
    #[serde(default)]
    percent: u8,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterSwapInfo {
    amm_key: String,
    #[serde(default)]
    label: String,
    #[serde_as(as = "DisplayFromStr")]
    input_mint: Pubkey,
    #[serde_as(as = "DisplayFromStr")]
    output_mint: Pubkey,
    in_amount: String,
    out_amount: String,
}

fn parse_units(field: &str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|e| eyre!("invalid {} {:?}: {}", field, raw, e))
}

impl JupiterAggregator {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
        Ok(Self { http_client, quote_api_url: config.quote_api_url.trim_end_matches('/').to_string() })
    }

    fn into_quote(request: &QuoteRequest, raw: JupiterQuote) -> Result<Quote> {
        let route = raw
            .route_plan
            .into_iter()
            .map(|step| -> Result<RouteHop> {
                Ok(RouteHop {
                    in_amount: parse_units("inAmount", &step.swap_info.in_amount)?,
                    out_amount: parse_units("outAmount", &step.swap_info.out_amount)?,
                    amm_key: step.swap_info.amm_key,
                    label: step.swap_info.label,
                    input_mint: step.swap_info.input_mint,
                    output_mint: step.swap_info.output_mint,
                    percent: step.percent,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Quote {
            request: request.clone(),
            route,
            output_amount: parse_units("outAmount", &raw.out_amount)?,
            price_impact_pct: raw.price_impact_pct.parse().unwrap_or(0.0),
        })
    }
}

#[async_trait]
impl QuoteAggregator for JupiterAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>> {
        let url = format!("{}/quote", self.quote_api_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if let Some(error) = body.get("error") {
            debug!("No route for {:?}: {}", request, error);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(eyre!("quote API returned HTTP {}", status));
        }

        let raw: JupiterQuote = serde_json::from_value(body)?;
        if raw.route_plan.is_empty() {
            return Ok(None);
        }
        Self::into_quote(request, raw).map(Some)
    }
}

struct Pending {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct EngineInner {
    aggregator: Arc<dyn QuoteAggregator>,
    debounce: Duration,
    pending: Mutex<Pending>,
    state_tx: watch::Sender<QuoteState>,
}

impl EngineInner {
    // Commit only if `generation` is still the latest input.
    fn commit(&self, generation: u64, outcome: QuoteOutcome) -> bool {
        let pending = self.pending.lock();
        if pending.generation != generation {
            debug!("Discarding quote for superseded input (generation {})", generation);
            return false;
        }
        self.state_tx.send_replace(QuoteState { fetching: false, outcome });
        true
    }
}

/// Debounced, last-input-wins swap quoting.
///
/// Every `submit` supersedes the previous one: its pending timer (or
/// in-flight request) is cancelled and any result it still produces is
/// discarded by generation.
pub struct QuoteEngine {
    inner: Arc<EngineInner>,
}

impl QuoteEngine {
    pub fn new(aggregator: Arc<dyn QuoteAggregator>, debounce: Duration) -> Self {
        let (state_tx, _) = watch::channel(QuoteState::default());
        Self {
            inner: Arc::new(EngineInner {
                aggregator,
                debounce,
                pending: Mutex::new(Pending { generation: 0, task: None }),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> QuoteState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<QuoteState> {
        self.inner.state_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.inner.pending.lock().generation
    }

    /// Accept new input. Must be called inside a Tokio runtime.
    pub fn submit(&self, input: &QuoteInput) {
        let Some(request) = input.to_request() else {
            self.reset();
            return;
        };

        let mut pending = self.inner.pending.lock();
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;
        self.inner.state_tx.send_modify(|state| state.fetching = true);

        let inner = Arc::clone(&self.inner);
        pending.task = Some(tokio::spawn(async move {
            sleep(inner.debounce).await;
            let outcome = match inner.aggregator.quote(&request).await {
                Ok(Some(quote)) => QuoteOutcome::Route(quote),
                Ok(None) => QuoteOutcome::NoRoute,
                Err(e) => {
                    warn!("Quote request for {:?} failed: {}", request, e);
                    QuoteOutcome::NoRoute
                }
            };
            inner.commit(generation, outcome);
        }));
    }

    /// Cancel anything pending and show no route.
    pub fn reset(&self) {
        let mut pending = self.inner.pending.lock();
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        pending.generation += 1;
        self.inner.state_tx.send_replace(QuoteState::default());
    }
}

impl Drop for QuoteEngine {
    fn drop(&mut self) {
        if let Some(task) = self.inner.pending.lock().task.take() {
            task.abort();
        }
    }
}
