use crate::data_sync::config::SyncConfig;
use crate::data_sync::rpc::filter_matches;
use crate::utils::address::Pubkey;
use async_trait::async_trait;
use eyre::{Result, eyre};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use solana_account_decoder::{UiAccount, UiAccountEncoding};
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::RpcFilterType;
use solana_client::rpc_response::{Response, RpcKeyedAccount};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// What to watch on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionRequest {
    /// A single account
    Account { address: Pubkey },
    /// Every account owned by a program that passes all filters
    Program { program_id: Pubkey, filters: Vec<RpcFilterType> },
}

impl SubscriptionRequest {
    fn subscribe_method(&self) -> &'static str {
        match self {
            Self::Account { .. } => "accountSubscribe",
            Self::Program { .. } => "programSubscribe",
        }
    }

    fn unsubscribe_method(&self) -> &'static str {
        match self {
            Self::Account { .. } => "accountUnsubscribe",
            Self::Program { .. } => "programUnsubscribe",
        }
    }

    fn params(&self) -> Value {
        let account_config = RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            ..Default::default()
        };
        match self {
            Self::Account { address } => json!([address.to_string(), account_config]),
            Self::Program { program_id, filters } => {
                let config = RpcProgramAccountsConfig {
                    filters: (!filters.is_empty()).then(|| filters.clone()),
                    account_config,
                    ..Default::default()
                };
                json!([program_id.to_string(), config])
            }
        }
    }

    /// Whether an account pushed for this request actually belongs to it.
    pub fn accepts(&self, event: &PushEvent) -> bool {
        match self {
            Self::Account { address } => event.address == *address,
            Self::Program { program_id, filters } => {
                event.account.owner == *program_id && filters.iter().all(|f| filter_matches(f, &event.account.data))
            }
        }
    }
}

impl fmt::Display for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { address } => write!(f, "account:{}", address),
            Self::Program { program_id, filters } => write!(f, "program:{}[{} filters]", program_id, filters.len()),
        }
    }
}

/// One change notification for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub address: Pubkey,
    pub account: Account,
    pub slot: u64,
}

/// Closes its subscription when `close` is called or when dropped. After
/// `close` returns no further event is delivered to the paired receiver.
pub struct SubscriptionHandle {
    label: String,
    cancel: Option<oneshot::Sender<()>>,
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// A new open handle and the signal its producer should watch.
    pub fn new(label: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = Self { label: label.into(), cancel: Some(cancel_tx), closed: Arc::new(AtomicBool::new(false)) };
        (handle, cancel_rx)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn close(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            self.closed.store(true, Ordering::SeqCst);
            let _ = cancel.send(());
            debug!("Closed subscription {}", self.label);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle").field("label", &self.label).field("closed", &self.is_closed()).finish()
    }
}

/// A live subscription: a stream of pushes plus the handle that ends it.
///
/// `resyncs` ticks every time the source re-established the subscription
/// after losing it. Pushes sent while it was down are gone, so consumers
/// re-read the full state on each tick.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::Receiver<PushEvent>,
    pub resyncs: watch::Receiver<u64>,
    pub handle: SubscriptionHandle,
}

/// Source of account change pushes.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscribe(&self, request: SubscriptionRequest) -> Result<Subscription>;
}

/// Subscription source backed by the node's WebSocket JSON-RPC endpoint.
///
/// Each subscription owns its own connection. Events are forwarded with an
/// awaited send, so a slow consumer applies backpressure instead of losing
/// pushes.
#[derive(Debug, Clone)]
pub struct WebSocketSource {
    rpc_url: String,
    connection_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    channel_buffer_size: usize,
}

enum SessionEnd {
    Cancelled,
    ReceiverDropped,
}

/// Per-subscription state shared by every connection attempt.
struct Forwarder {
    request: SubscriptionRequest,
    event_tx: mpsc::Sender<PushEvent>,
    resync_tx: watch::Sender<u64>,
    confirmed_sessions: u64,
}

impl Forwarder {
    fn confirmed(&mut self) {
        self.confirmed_sessions += 1;
        if self.confirmed_sessions > 1 {
            self.resync_tx.send_modify(|n| *n += 1);
        }
    }

    /// Connect, subscribe and forward notifications until cancelled.
    async fn run_session(
        &mut self,
        rpc_url: &str,
        connection_timeout: Duration,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> Result<SessionEnd> {
        let url = Url::parse(rpc_url)?;
        debug!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = timeout(connection_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| eyre!("WebSocket connection timeout"))?
            .map_err(|e| eyre!("WebSocket connection failed: {}", e))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let subscribe_request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.request.subscribe_method(),
            "params": self.request.params(),
        });
        ws_sender.send(Message::Text(subscribe_request.to_string().into())).await?;

        let subscription_id = match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => parse_confirmation(text.as_str())?,
            Some(Ok(msg)) => {
                return Err(eyre!("Unexpected message type during subscription: {:?}", msg));
            }
            Some(Err(e)) => {
                return Err(eyre!("WebSocket error during subscription: {}", e));
            }
            None => {
                return Err(eyre!("WebSocket closed during subscription"));
            }
        };

        info!("Subscribed to {} with ID: {}", self.request, subscription_id);
        self.confirmed();

        let end = loop {
            tokio::select! {
                ws_msg = ws_receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            let event = match parse_notification(text.as_str(), &self.request) {
                                Ok(Some(event)) => event,
                                Ok(None) => continue,
                                Err(e) => {
                                    warn!("Failed to handle WebSocket message: {}", e);
                                    continue;
                                }
                            };
                            tokio::select! {
                                sent = self.event_tx.send(event) => {
                                    if sent.is_err() {
                                        break SessionEnd::ReceiverDropped;
                                    }
                                }
                                _ = &mut *cancel_rx => break SessionEnd::Cancelled,
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err(eyre!("WebSocket closed by server"));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await.map_err(|e| eyre!("Failed to send pong: {}", e))?;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(eyre!("WebSocket error: {}", e));
                        }
                        None => {
                            return Err(eyre!("WebSocket stream ended"));
                        }
                    }
                }

                _ = &mut *cancel_rx => break SessionEnd::Cancelled,
            }
        };

        let unsubscribe_request = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": self.request.unsubscribe_method(),
            "params": [subscription_id],
        });
        if let Err(e) = ws_sender.send(Message::Text(unsubscribe_request.to_string().into())).await {
            debug!("Unsubscribe for {} not delivered: {}", self.request, e);
        }
        let _ = ws_sender.close().await;

        Ok(end)
    }
}

impl WebSocketSource {
    pub fn new(
        rpc_url: String,
        connection_timeout: Duration,
        max_reconnect_attempts: u32,
        reconnect_delay: Duration,
        channel_buffer_size: usize,
    ) -> Self {
        Self { rpc_url, connection_timeout, max_reconnect_attempts, reconnect_delay, channel_buffer_size }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.rpc_wss_url.clone(),
            config.ws_connection_timeout(),
            config.max_reconnect_attempts,
            config.reconnect_delay(),
            config.channel_buffer_size,
        )
    }
}

#[async_trait]
impl SubscriptionSource for WebSocketSource {
    async fn subscribe(&self, request: SubscriptionRequest) -> Result<Subscription> {
        let (event_tx, event_rx) = mpsc::channel(self.channel_buffer_size.max(1));
        let (resync_tx, resync_rx) = watch::channel(0);
        let (handle, mut cancel_rx) = SubscriptionHandle::new(request.to_string());

        let source = self.clone();
        tokio::spawn(async move {
            let mut forwarder = Forwarder { request, event_tx, resync_tx, confirmed_sessions: 0 };
            // consecutive failures since the last confirmed subscription
            let mut reconnect_count = 0;

            loop {
                let confirmed_before = forwarder.confirmed_sessions;
                match forwarder.run_session(&source.rpc_url, source.connection_timeout, &mut cancel_rx).await {
                    Ok(SessionEnd::Cancelled) => {
                        debug!("Subscription {} cancelled", forwarder.request);
                        break;
                    }
                    Ok(SessionEnd::ReceiverDropped) => {
                        debug!("Subscription {} consumer went away", forwarder.request);
                        break;
                    }
                    Err(e) => {
                        error!("Subscription {} connection error: {}", forwarder.request, e);
                        if forwarder.confirmed_sessions > confirmed_before {
                            reconnect_count = 0;
                        }
                        reconnect_count += 1;

                        if reconnect_count >= source.max_reconnect_attempts {
                            error!("Max reconnection attempts reached for {}, giving up", forwarder.request);
                            break;
                        }

                        warn!("Attempting reconnection #{} in {:?}", reconnect_count, source.reconnect_delay);
                        tokio::select! {
                            _ = sleep(source.reconnect_delay) => {}
                            _ = &mut cancel_rx => break,
                        }
                    }
                }
            }
        });

        Ok(Subscription { events: event_rx, resyncs: resync_rx, handle })
    }
}

fn parse_confirmation(text: &str) -> Result<u64> {
    let response: Value = serde_json::from_str(text)?;
    if let Some(result) = response.get("result") {
        result.as_u64().ok_or_else(|| eyre!("Invalid subscription ID format: {}", result))
    } else if let Some(error) = response.get("error") {
        Err(eyre!("Subscription error: {}", error))
    } else {
        Err(eyre!("Unexpected subscription response: {}", text))
    }
}

fn decode_account(ui: &UiAccount) -> Result<Account> {
    ui.decode::<Account>().ok_or_else(|| eyre!("Undecodable account data"))
}

/// Turn a notification frame into a push event. Frames that are not
/// notifications (e.g. unsubscribe acks) yield `None`.
pub(crate) fn parse_notification(text: &str, request: &SubscriptionRequest) -> Result<Option<PushEvent>> {
    let mut message: Value = serde_json::from_str(text)?;
    let Some(method) = message.get("method").and_then(Value::as_str).map(str::to_string) else {
        return Ok(None);
    };
    let result = message
        .get_mut("params")
        .and_then(|params| params.get_mut("result"))
        .map(Value::take)
        .ok_or_else(|| eyre!("Notification {} without result", method))?;

    match (method.as_str(), request) {
        ("accountNotification", SubscriptionRequest::Account { address }) => {
            let response: Response<UiAccount> = serde_json::from_value(result)?;
            let account = decode_account(&response.value)?;
            Ok(Some(PushEvent { address: *address, account, slot: response.context.slot }))
        }
        ("programNotification", SubscriptionRequest::Program { .. }) => {
            let response: Response<RpcKeyedAccount> = serde_json::from_value(result)?;
            let keyed = response.value;
            let address = keyed.pubkey.parse::<Pubkey>().map_err(|e| eyre!("invalid pubkey {}: {}", keyed.pubkey, e))?;
            let account = decode_account(&keyed.account)?;
            Ok(Some(PushEvent { address, account, slot: response.context.slot }))
        }
        (method, _) => Err(eyre!("Unexpected notification {} for {}", method, request)),
    }
}
