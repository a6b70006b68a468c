//! Shared fakes for unit and integration tests.

use crate::data_sync::websocket::{PushEvent, Subscription, SubscriptionHandle, SubscriptionRequest, SubscriptionSource};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::routing::post;
use axum::{Json, Router};
use eyre::{Result, eyre};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Serve `body` as a JSON 200 response to every request. Returns the base URL.
pub async fn serve_json(body: String) -> String {
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move { ([(CONTENT_TYPE, "application/json")], body) }
    });
    serve(app).await
}

type RpcResults = Arc<HashMap<String, Value>>;

async fn answer_rpc(State(results): State<RpcResults>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let response = match results.get(method) {
        Some(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        None if method == "getVersion" => {
            json!({ "jsonrpc": "2.0", "id": id, "result": { "solana-core": "2.1.0", "feature-set": 0 } })
        }
        None => json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": "Method not found" } }),
    };
    Json(response)
}

/// JSON-RPC node answering each method with a fixed result. Unknown methods
/// get a JSON-RPC error.
pub async fn serve_rpc(results: Vec<(&str, Value)>) -> String {
    let results: RpcResults = Arc::new(results.into_iter().map(|(method, result)| (method.to_string(), result)).collect());
    let app = Router::new().route("/", post(answer_rpc)).with_state(results);
    serve(app).await
}

/// A URL nothing listens on.
pub fn dead_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub struct MockFeed {
    pub request: SubscriptionRequest,
    pub sender: Option<mpsc::Sender<PushEvent>>,
    resync: watch::Sender<u64>,
    cancel: oneshot::Receiver<()>,
}

impl MockFeed {
    pub fn is_closed(&mut self) -> bool {
        !matches!(self.cancel.try_recv(), Err(oneshot::error::TryRecvError::Empty))
    }
}

/// In-memory subscription source; tests push events through the recorded
/// feeds.
#[derive(Default)]
pub struct MockSource {
    feeds: Mutex<Vec<MockFeed>>,
    fail: AtomicBool,
}

impl MockSource {
    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.feeds.lock().len()
    }

    pub fn request(&self, index: usize) -> Option<SubscriptionRequest> {
        self.feeds.lock().get(index).map(|f| f.request.clone())
    }

    pub fn sender(&self, index: usize) -> Option<mpsc::Sender<PushEvent>> {
        self.feeds.lock().get(index).and_then(|f| f.sender.clone())
    }

    /// Signal that feed `index` was re-established after a drop.
    pub fn resync(&self, index: usize) {
        if let Some(feed) = self.feeds.lock().get(index) {
            feed.resync.send_modify(|n| *n += 1);
        }
    }

    /// End feed `index` as a source does when it gives up reconnecting.
    pub fn end(&self, index: usize) {
        if let Some(feed) = self.feeds.lock().get_mut(index) {
            feed.sender = None;
        }
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.feeds.lock().get_mut(index).is_none_or(MockFeed::is_closed)
    }

    pub async fn push(&self, index: usize, event: PushEvent) {
        let sender = self.sender(index).unwrap();
        sender.send(event).await.unwrap();
    }

    /// Wait until at least `count` subscriptions were opened.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..1000 {
            if self.count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {} subscriptions, saw {}", count, self.count());
    }
}

#[async_trait]
impl SubscriptionSource for MockSource {
    async fn subscribe(&self, request: SubscriptionRequest) -> Result<Subscription> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(eyre!("subscription refused"));
        }
        let (sender, events) = mpsc::channel(64);
        let (resync, resyncs) = watch::channel(0);
        let (handle, cancel) = SubscriptionHandle::new(request.to_string());
        self.feeds.lock().push(MockFeed { request, sender: Some(sender), resync, cancel });
        Ok(Subscription { events, resyncs, handle })
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}
