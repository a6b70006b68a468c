use crate::accounts::DecodeError;
use crate::data_sync::websocket::{PushEvent, SubscriptionHandle, SubscriptionRequest, SubscriptionSource};
use crate::store::KeyedStore;
use async_trait::async_trait;
use eyre::Result;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CoordinatorState {
    Idle,
    Fetching,
    Subscribed,
}

/// Effect of one push on the domain's store.
#[derive(Debug, Clone, PartialEq)]
pub enum PushUpdate<K, V> {
    Upsert(K, V),
    Remove(K),
}

/// One kind of remote state kept in sync: where it lives, how to read it in
/// bulk, how to watch it and how to decode a push.
#[async_trait]
pub trait SyncDomain: Send + Sync + 'static {
    /// Dependency the sync is scoped to (a wallet address, or `()`).
    type Scope: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    type Key: Clone + Eq + Hash + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    /// Wipe the store when the coordinator is torn down.
    const CLEAR_ON_DEACTIVATE: bool = false;

    fn name(&self) -> &'static str;

    fn store(&self) -> &KeyedStore<Self::Key, Self::Value>;

    fn subscription(&self, scope: &Self::Scope) -> SubscriptionRequest;

    async fn fetch_all(&self, scope: &Self::Scope) -> Result<Vec<(Self::Key, Self::Value)>>;

    fn decode_push(&self, scope: &Self::Scope, event: &PushEvent) -> Result<PushUpdate<Self::Key, Self::Value>, DecodeError>;
}

// Every store write and state change happens under this lock after checking
// that `generation` still belongs to the writer.
struct Gate {
    generation: u64,
    handle: Option<SubscriptionHandle>,
}

struct Session<S> {
    scope: S,
    task: JoinHandle<()>,
}

struct Inner<D: SyncDomain> {
    domain: Arc<D>,
    source: Arc<dyn SubscriptionSource>,
    gate: Mutex<Gate>,
    state_tx: watch::Sender<CoordinatorState>,
}

/// Drives one domain through `Idle -> Fetching -> Subscribed -> Idle`.
///
/// Activation must happen inside a Tokio runtime.
pub struct Coordinator<D: SyncDomain> {
    inner: Arc<Inner<D>>,
    session: Mutex<Option<Session<D::Scope>>>,
}

impl<D: SyncDomain> Coordinator<D> {
    pub fn new(domain: Arc<D>, source: Arc<dyn SubscriptionSource>) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Idle);
        Self {
            inner: Arc::new(Inner { domain, source, gate: Mutex::new(Gate { generation: 0, handle: None }), state_tx }),
            session: Mutex::new(None),
        }
    }

    pub fn domain(&self) -> &Arc<D> {
        &self.inner.domain
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.inner.gate.lock().generation
    }

    /// Scope of the current activation, if any.
    pub fn scope(&self) -> Option<D::Scope> {
        self.session.lock().as_ref().map(|s| s.scope.clone())
    }

    pub fn has_open_subscription(&self) -> bool {
        self.inner.gate.lock().handle.is_some()
    }

    /// Start syncing for `scope`. A different scope tears the current one
    /// down first; the same scope while still live is a no-op.
    pub fn activate(&self, scope: D::Scope) {
        let mut session = self.session.lock();
        self.start(&mut session, scope);
    }

    /// Restart the current scope when its sync stopped on its own, e.g. the
    /// subscription ended or could not be opened. Returns whether it restarted.
    pub fn resume_if_idle(&self) -> bool {
        let mut session = self.session.lock();
        let Some(scope) = session.as_ref().map(|s| s.scope.clone()) else {
            return false;
        };
        if self.state() != CoordinatorState::Idle {
            return false;
        }
        info!("{} resuming for {:?}", self.inner.domain.name(), scope);
        self.start(&mut session, scope);
        true
    }

    fn start(&self, session: &mut Option<Session<D::Scope>>, scope: D::Scope) {
        if let Some(current) = session.as_ref() {
            if current.scope == scope && self.state() != CoordinatorState::Idle {
                debug!("{} already active for {:?}", self.inner.domain.name(), scope);
                return;
            }
        }
        if let Some(previous) = session.take() {
            self.inner.teardown();
            previous.task.abort();
        }

        let generation = {
            let mut gate = self.inner.gate.lock();
            gate.generation += 1;
            self.inner.state_tx.send_replace(CoordinatorState::Fetching);
            gate.generation
        };
        info!("{} activating for {:?} (generation {})", self.inner.domain.name(), scope, generation);

        let task = tokio::spawn(Inner::run(self.inner.clone(), generation, scope.clone()));
        *session = Some(Session { scope, task });
    }

    /// Close the subscription and discard anything still in flight.
    pub fn deactivate(&self) {
        if let Some(previous) = self.session.lock().take() {
            self.inner.teardown();
            previous.task.abort();
            info!("{} deactivated for {:?}", self.inner.domain.name(), previous.scope);
        }
    }
}

impl<D: SyncDomain> Drop for Coordinator<D> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<D: SyncDomain> Inner<D> {
    fn teardown(&self) {
        let mut gate = self.gate.lock();
        gate.generation += 1;
        if let Some(mut handle) = gate.handle.take() {
            handle.close();
        }
        if D::CLEAR_ON_DEACTIVATE {
            self.domain.store().clear();
        }
        self.state_tx.send_replace(CoordinatorState::Idle);
    }

    async fn run(self: Arc<Self>, generation: u64, scope: D::Scope) {
        let name = self.domain.name();
        let request = self.domain.subscription(&scope);

        // subscribe before the bulk read so no change slips between the two
        let (mut events, mut resyncs) = match self.source.subscribe(request.clone()).await {
            Ok(subscription) => {
                let mut gate = self.gate.lock();
                if gate.generation != generation {
                    return;
                }
                gate.handle = Some(subscription.handle);
                (Some(subscription.events), Some(subscription.resyncs))
            }
            Err(e) => {
                warn!("{} subscription for {:?} failed, live updates disabled: {}", name, scope, e);
                (None, None)
            }
        };

        loop {
            let mut buffered = Vec::new();
            let mut resynced = false;
            let fetch = self.domain.fetch_all(&scope);
            tokio::pin!(fetch);
            let bulk = loop {
                tokio::select! {
                    result = &mut fetch => break result,
                    Some(event) = next_event(&mut events) => buffered.push(event),
                    Some(()) = next_resync(&mut resyncs) => resynced = true,
                }
            };
            let bulk = bulk.unwrap_or_else(|e| {
                warn!("{} bulk read for {:?} failed: {}", name, scope, e);
                Vec::new()
            });

            {
                let gate = self.gate.lock();
                if gate.generation != generation {
                    debug!("{} discarding stale bulk result for {:?}", name, scope);
                    return;
                }
                let count = bulk.len();
                self.domain.store().replace(bulk);
                for event in buffered.iter() {
                    self.apply(&scope, &request, event);
                }
                debug!("{} committed {} entries and {} buffered pushes", name, count, buffered.len());

                let state = if events.is_some() { CoordinatorState::Subscribed } else { CoordinatorState::Idle };
                self.state_tx.send_replace(state);
            }

            let Some(rx) = events.as_mut() else {
                return;
            };
            if !resynced {
                resynced = loop {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(event) => {
                                let gate = self.gate.lock();
                                if gate.generation != generation {
                                    return;
                                }
                                self.apply(&scope, &request, &event);
                            }
                            None => break false,
                        },
                        Some(()) = next_resync(&mut resyncs) => break true,
                    }
                };
            }
            if !resynced {
                break;
            }

            // pushes queued before the reconnect are older than the re-read
            {
                let gate = self.gate.lock();
                if gate.generation != generation {
                    return;
                }
                while let Ok(event) = rx.try_recv() {
                    self.apply(&scope, &request, &event);
                }
                self.state_tx.send_replace(CoordinatorState::Fetching);
            }
            info!("{} re-reading {:?} after its subscription was re-established", name, scope);
        }

        let mut gate = self.gate.lock();
        if gate.generation == generation {
            warn!("{} subscription for {:?} ended", name, scope);
            gate.handle = None;
            self.state_tx.send_replace(CoordinatorState::Idle);
        }
    }

    // caller holds the gate
    fn apply(&self, scope: &D::Scope, request: &SubscriptionRequest, event: &PushEvent) {
        if !request.accepts(event) {
            debug!("{} ignoring push for {} outside {}", self.domain.name(), event.address, request);
            return;
        }
        match self.domain.decode_push(scope, event) {
            Ok(PushUpdate::Upsert(key, value)) => self.domain.store().upsert_one(key, value),
            Ok(PushUpdate::Remove(key)) => {
                self.domain.store().remove_one(&key);
            }
            Err(e) => debug!("{} dropping undecodable push for {}: {}", self.domain.name(), event.address, e),
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<PushEvent>>) -> Option<PushEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// Pending forever once the source stops signalling.
async fn next_resync(resyncs: &mut Option<watch::Receiver<u64>>) -> Option<()> {
    if let Some(rx) = resyncs.as_mut() {
        if rx.changed().await.is_ok() {
            return Some(());
        }
    }
    *resyncs = None;
    std::future::pending().await
}
