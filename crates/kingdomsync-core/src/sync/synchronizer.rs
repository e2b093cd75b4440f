//! The resource synchronizer
//!
//! `Synchronizer` is the session-scoped context every page shares: it owns
//! the `ResourceStore`, the last observed resolve timers and the event
//! channel, and it is the only thing allowed to write into the store.
//!
//! ## Refresh
//!
//! ```text
//! refresh([A, B], [post_form])
//!   ├── mark A, B loading            (before the returned future is polled)
//!   ├── await post_form
//!   ├── GET api/A → store A, clear flag, emit Updated(A)
//!   └── GET api/B → store B, clear flag, emit Updated(B)
//! ```
//!
//! ## Periodic tick
//!
//! ```text
//! periodic_tick()
//!   ├── skip unless initial load done and kingdomid.created != false
//!   ├── refresh([kingdom])
//!   ├── diff kingdom.next_resolve against last seen timers
//!   ├── changed? → refresh(union of dependents)
//!   └── remember the new timers
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::SyncEvent;
use super::pipeline::{RefreshPipeline, Step};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::logging::summary::{FAILED_MSG, UPDATED_MSG};
use crate::resolve::ResolveTimestamps;
use crate::resource::{ResourceKey, Selection};
use crate::session::{AuthSession, SessionState};
use crate::store::{ResourceStore, StoreSnapshot};

/// An action awaited before a refresh issues its fetches
pub type SideEffect = BoxFuture<'static, SyncResult<()>>;

/// Box an async action for use as a refresh side effect.
pub fn side_effect<F>(future: F) -> SideEffect
where
    F: Future<Output = SyncResult<()>> + Send + 'static,
{
    Box::pin(future)
}

/// Keys marked loading under a store generation, waiting to be fetched
struct Ticket {
    generation: u64,
    keys: Vec<ResourceKey>,
}

struct Inner {
    session: Arc<dyn AuthSession>,
    store: ResourceStore,
    resolve: Mutex<ResolveTimestamps>,
    initial_started: AtomicBool,
    initial_loaded: AtomicBool,
    event_tx: broadcast::Sender<SyncEvent>,
    config: SyncConfig,
}

/// Session-scoped mirror of the game's server resources
///
/// Cheap to clone; every clone shares the same store.
///
/// # Example
///
/// ```ignore
/// let session = Arc::new(HttpSession::new("https://game.example", token)?);
/// let sync = Synchronizer::new(session);
///
/// sync.initial_load().await;
/// let handle = Poller::new(sync.clone()).spawn();
///
/// // "POST this form, then refresh these two keys"
/// sync.submit("api/build", json!({"farms": 10}), [ResourceKey::Kingdom, ResourceKey::Structures])
///     .await;
/// ```
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    /// Create a synchronizer for a freshly authenticated session.
    pub fn new(session: Arc<dyn AuthSession>) -> Self {
        Self::with_config(session, SyncConfig::default())
    }

    pub fn with_config(session: Arc<dyn AuthSession>, config: SyncConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                session,
                store: ResourceStore::new(),
                resolve: Mutex::new(ResolveTimestamps::new()),
                initial_started: AtomicBool::new(false),
                initial_loaded: AtomicBool::new(false),
                event_tx,
                config,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<dyn AuthSession> {
        &self.inner.session
    }

    /// Subscribe to sync events
    ///
    /// Multiple subscribers can exist; events are broadcast to all.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Consistent copy of every value and loading flag
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.store.snapshot()
    }

    /// Last stored value for `key`
    pub fn value(&self, key: ResourceKey) -> Arc<Value> {
        self.inner.store.value(key)
    }

    pub fn is_loading(&self, key: ResourceKey) -> bool {
        self.inner.store.is_loading(key)
    }

    pub fn is_initial_load_complete(&self) -> bool {
        self.inner.initial_loaded.load(Ordering::SeqCst)
    }

    /// Resolve timers as of the last tick
    pub fn resolve_timestamps(&self) -> ResolveTimestamps {
        self.inner.resolve.lock().clone()
    }

    /// Whether the session is still live (store accepts writes)
    pub fn is_active(&self) -> bool {
        self.inner.store.is_open()
    }

    /// `kingdomid.created`, if the server reported it
    pub fn kingdom_created(&self) -> Option<bool> {
        self.value(ResourceKey::KingdomId)
            .get("created")
            .and_then(Value::as_bool)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Refresh `selection`, after awaiting `side_effects` in order.
    ///
    /// The targeted keys are marked loading before this returns, so a caller
    /// that never polls the future still sees the loading state. Fetches run
    /// one key at a time in selection order; a failed fetch keeps the old
    /// value and still clears the flag. Never fails.
    pub fn refresh(
        &self,
        selection: impl Into<Selection>,
        side_effects: Vec<SideEffect>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.begin(selection.into().resolve());
        let this = self.clone();
        async move {
            if let Some(ticket) = ticket {
                this.run(ticket, side_effects).await;
            }
        }
    }

    /// POST `body` to `path`, then refresh `selection`.
    pub fn submit(
        &self,
        path: impl Into<String>,
        body: Value,
        selection: impl Into<Selection>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let session = self.inner.session.clone();
        let path = path.into();
        let post = side_effect(async move { session.post_json(&path, &body).await.map(|_| ()) });
        self.refresh(selection, vec![post])
    }

    /// Load every resource once. Periodic ticks stay inert until this finishes.
    ///
    /// A call made while another load is running returns immediately.
    pub async fn initial_load(&self) {
        if self
            .inner
            .initial_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Initial load already started");
            return;
        }
        if !self.ensure_session().await {
            self.inner.initial_started.store(false, Ordering::SeqCst);
            return;
        }
        if !self.inner.session.is_logged_in() {
            warn!("Initial load requested without a logged-in session");
            self.inner.initial_started.store(false, Ordering::SeqCst);
            return;
        }

        info!(resources = ResourceKey::ALL.len(), "Starting initial load");
        self.refresh(Selection::All, Vec::new()).await;

        if self.ensure_session().await {
            self.inner.initial_loaded.store(true, Ordering::SeqCst);
            info!("Initial load complete");
            self.emit(SyncEvent::InitialLoadComplete);
        }
    }

    /// One poll: refresh `kingdom`, then whatever its resolve timers invalidate.
    pub async fn periodic_tick(&self) {
        if !self.is_initial_load_complete() {
            debug!("Tick skipped: initial load pending");
            return;
        }
        if self.kingdom_created() == Some(false) {
            debug!("Tick skipped: kingdom not created yet");
            return;
        }
        let Some(ticket) = self.begin(vec![ResourceKey::Kingdom]) else {
            return;
        };

        let landed = self.run(ticket, Vec::new()).await;
        let kingdom = landed
            .into_iter()
            .find(|(key, _)| *key == ResourceKey::Kingdom)
            .and_then(|(_, value)| value);
        let Some(kingdom) = kingdom else {
            debug!("Kingdom fetch did not land; resolve check skipped");
            return;
        };

        let next = ResolveTimestamps::from_kingdom(&kingdom);
        let diff = self.inner.resolve.lock().diff(&next);

        if diff.is_empty() {
            *self.inner.resolve.lock() = next;
            return;
        }

        info!(
            events = ?diff.changed,
            keys = ?diff.keys,
            "Resolve timers fired"
        );
        self.emit(SyncEvent::ResolveFired {
            events: diff.changed.clone(),
            keys: diff.keys.iter().copied().collect(),
        });
        let dependents = self.refresh(diff.keys, Vec::new());
        *self.inner.resolve.lock() = next;
        dependents.await;
    }

    /// End the session: later writes, including those of refreshes still in
    /// flight, are dropped.
    pub fn teardown(&self) {
        self.close("session closed".to_string());
    }

    fn close(&self, reason: String) {
        if let Some(generation) = self.inner.store.close() {
            self.inner.initial_loaded.store(false, Ordering::SeqCst);
            info!(generation, %reason, "Store torn down");
            self.emit(SyncEvent::SessionEnded { reason });
        }
    }

    /// Check the auth collaborator; an error-bearing session is fatal.
    async fn ensure_session(&self) -> bool {
        match self.inner.session.state() {
            SessionState::Error(message) => {
                self.end_session(message).await;
                false
            }
            _ => self.is_active(),
        }
    }

    async fn end_session(&self, message: String) {
        warn!(%message, "Session error; logging out");
        self.inner.session.logout().await;
        self.close(message);
    }

    /// Why the session can no longer be used after a fetch, if it can't
    fn session_failure(&self, result: &SyncResult<Value>) -> Option<String> {
        if let SessionState::Error(message) = self.inner.session.state() {
            return Some(message);
        }
        match result {
            Err(err) if err.is_session_error() => Some(err.to_string()),
            _ => None,
        }
    }

    fn begin(&self, keys: Vec<ResourceKey>) -> Option<Ticket> {
        let generation = self.inner.store.generation();
        if !self.inner.store.begin(generation, &keys) {
            debug!("Refresh ignored: session torn down");
            return None;
        }
        if !keys.is_empty() {
            self.emit(SyncEvent::Loading { keys: keys.clone() });
        }
        Some(Ticket { generation, keys })
    }

    async fn run(&self, ticket: Ticket, side_effects: Vec<SideEffect>) -> Vec<(ResourceKey, Option<Value>)> {
        if !self.ensure_session().await {
            return Vec::new();
        }

        for (index, effect) in side_effects.into_iter().enumerate() {
            if let Err(err) = effect.await {
                warn!(index, error = %err, "Side effect failed; refreshing anyway");
                self.emit(SyncEvent::SideEffectFailed {
                    index,
                    message: err.to_string(),
                });
            }
        }

        let generation = ticket.generation;
        debug!(generation, keys = ?ticket.keys, "Refreshing");
        RefreshPipeline::new(ticket.keys)
            .drain(|key| {
                let this = self.clone();
                async move { this.fetch_one(generation, key).await }
            })
            .await
    }

    async fn fetch_one(&self, generation: u64, key: ResourceKey) -> Step {
        if !self.inner.store.accepts(generation) {
            return Step::Stop;
        }

        let path = key.endpoint();
        let result = self.inner.session.get_json(&path).await;
        let failure = self.session_failure(&result);
        let step = match result {
            Ok(value) => {
                if !self.inner.store.complete(generation, key, Some(value.clone())) {
                    debug!(%key, "Dropping late result for torn-down store");
                    return Step::Stop;
                }
                debug!(%key, "{}", UPDATED_MSG);
                self.emit(SyncEvent::Updated { key });
                Step::Landed(Some(value))
            }
            Err(err) => {
                if !self.inner.store.complete(generation, key, None) {
                    return Step::Stop;
                }
                warn!(%key, error = %err, "{}", FAILED_MSG);
                self.emit(SyncEvent::FetchFailed {
                    key,
                    message: err.to_string(),
                });
                Step::Landed(None)
            }
        };

        if let Some(message) = failure {
            debug!(%key, "Session failed mid-refresh; dropping remaining keys");
            self.end_session(message).await;
            return Step::Stop;
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use serde_json::json;

    fn setup() -> (Arc<MemorySession>, Synchronizer) {
        let session = Arc::new(MemorySession::new());
        let sync = Synchronizer::new(session.clone());
        (session, sync)
    }

    #[tokio::test]
    async fn test_refresh_marks_loading_before_polling() {
        let (session, sync) = setup();
        session.serve(ResourceKey::Settle, json!({"acres": 5}));

        let pending = sync.refresh(ResourceKey::Settle, Vec::new());
        assert!(sync.is_loading(ResourceKey::Settle));
        assert!(session.issued().is_empty());

        pending.await;
        assert!(!sync.is_loading(ResourceKey::Settle));
        assert_eq!(*sync.value(ResourceKey::Settle), json!({"acres": 5}));
    }

    #[tokio::test]
    async fn test_side_effects_run_in_order_before_fetches() {
        let (session, sync) = setup();
        session.serve(ResourceKey::Kingdom, json!({}));

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = order.clone();
            let session = session.clone();
            side_effect(async move {
                order.lock().push(format!("first, fetches so far: {}", session.issued().len()));
                Ok(())
            })
        };
        let second = {
            let order = order.clone();
            side_effect(async move {
                order.lock().push("second".to_string());
                Ok(())
            })
        };

        sync.refresh(ResourceKey::Kingdom, vec![first, second]).await;
        assert_eq!(
            *order.lock(),
            vec!["first, fetches so far: 0".to_string(), "second".to_string()]
        );
        assert_eq!(session.hits(ResourceKey::Kingdom), 1);
    }

    #[tokio::test]
    async fn test_failed_side_effect_does_not_block_fetch() {
        let (session, sync) = setup();
        session.serve(ResourceKey::Missiles, json!({"count": 2}));
        let mut events = sync.subscribe();

        let failing = side_effect(async {
            Err::<(), _>(crate::error::SyncError::SideEffect("form rejected".into()))
        });
        sync.refresh(ResourceKey::Missiles, vec![failing]).await;

        assert_eq!(*sync.value(ResourceKey::Missiles), json!({"count": 2}));
        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::SideEffectFailed { index, .. } = event {
                assert_eq!(index, 0);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_submit_posts_then_refreshes() {
        let (session, sync) = setup();
        session.serve(ResourceKey::Structures, json!({"farms": 10}));

        sync.submit("api/build", json!({"farms": 10}), [ResourceKey::Structures])
            .await;

        assert_eq!(session.posts().len(), 1);
        assert_eq!(session.posts()[0].0, "api/build");
        assert_eq!(*sync.value(ResourceKey::Structures), json!({"farms": 10}));
    }

    #[tokio::test]
    async fn test_duplicate_keys_fetched_once() {
        let (session, sync) = setup();
        session.serve(ResourceKey::News, json!(["a"]));

        sync.refresh(
            vec![ResourceKey::News, ResourceKey::News, ResourceKey::News],
            Vec::new(),
        )
        .await;

        assert_eq!(session.hits(ResourceKey::News), 1);
        assert!(!sync.is_loading(ResourceKey::News));
    }

    #[tokio::test]
    async fn test_tick_before_initial_load_is_noop() {
        let (session, sync) = setup();
        sync.periodic_tick().await;
        assert!(session.issued().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_emits_session_ended_once() {
        let (_session, sync) = setup();
        let mut events = sync.subscribe();

        sync.teardown();
        sync.teardown();

        assert!(!sync.is_active());
        assert!(matches!(
            events.try_recv(),
            Ok(SyncEvent::SessionEnded { .. })
        ));
        assert!(events.try_recv().is_err());
    }
}
