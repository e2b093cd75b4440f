//! In-memory session with canned responses
//!
//! Serves fixtures for the CLI's offline mode and scripted responses for
//! tests: static payloads, failures, per-request closures and artificial
//! latency, with a log of every request in issue and completion order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AuthSession, SessionState};
use crate::error::{SyncError, SyncResult};
use crate::resource::ResourceKey;

/// Produces the response for the n-th request (0-based) to a path
pub type Responder = Arc<dyn Fn(u64) -> SyncResult<Value> + Send + Sync>;

struct Route {
    responder: Responder,
    delay: Option<Duration>,
    hits: u64,
}

/// Scripted session that never touches the network
pub struct MemorySession {
    routes: Mutex<HashMap<String, Route>>,
    state: Mutex<SessionState>,
    issued: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, Value)>>,
    logouts: Mutex<u32>,
}

impl MemorySession {
    /// Create a logged-in session with no routes.
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            state: Mutex::new(SessionState::Active),
            issued: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            logouts: Mutex::new(0),
        }
    }

    /// Load `<dir>/<key>.json` for every resource key that has a file.
    ///
    /// Keys without a file answer 404, like a missing endpoint would.
    pub fn from_fixture_dir(dir: impl AsRef<Path>) -> SyncResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SyncError::Fixture(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let session = Self::new();
        let mut loaded = 0usize;
        for key in ResourceKey::ALL {
            let path = dir.join(format!("{}.json", key.as_str()));
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let value: Value = serde_json::from_str(&content).map_err(|e| {
                SyncError::Fixture(format!("{}: {}", path.display(), e))
            })?;
            session.serve(key, value);
            loaded += 1;
        }
        info!(dir = %dir.display(), loaded, "Loaded fixtures");
        Ok(session)
    }

    fn route(&self, path: String, responder: Responder) {
        let mut routes = self.routes.lock();
        let delay = routes.get(&path).and_then(|r| r.delay);
        routes.insert(
            path,
            Route {
                responder,
                delay,
                hits: 0,
            },
        );
    }

    /// Answer every request for `key` with `value`.
    pub fn serve(&self, key: ResourceKey, value: Value) {
        self.serve_path(&key.endpoint(), value);
    }

    /// Answer every request for `path` with `value`.
    pub fn serve_path(&self, path: &str, value: Value) {
        self.route(path.to_string(), Arc::new(move |_| Ok(value.clone())));
    }

    /// Answer requests for `key` with whatever `f` returns for the request ordinal.
    pub fn serve_fn<F>(&self, key: ResourceKey, f: F)
    where
        F: Fn(u64) -> SyncResult<Value> + Send + Sync + 'static,
    {
        self.route(key.endpoint(), Arc::new(f));
    }

    /// Make every request for `key` fail with a network error.
    pub fn fail(&self, key: ResourceKey, message: impl Into<String>) {
        let message = message.into();
        self.route(
            key.endpoint(),
            Arc::new(move |_| Err(SyncError::Network(message.clone()))),
        );
    }

    /// Delay responses for `key` by `delay`.
    pub fn delay(&self, key: ResourceKey, delay: Duration) {
        self.delay_path(&key.endpoint(), delay);
    }

    pub fn delay_path(&self, path: &str, delay: Duration) {
        let mut routes = self.routes.lock();
        match routes.get_mut(path) {
            Some(route) => route.delay = Some(delay),
            None => {
                let path_owned = path.to_string();
                routes.insert(
                    path_owned.clone(),
                    Route {
                        responder: Arc::new(move |_| {
                            Err(SyncError::HttpStatus {
                                path: path_owned.clone(),
                                status: 404,
                            })
                        }),
                        delay: Some(delay),
                        hits: 0,
                    },
                );
            }
        }
    }

    /// Put the session into an error state, as a token-auth library would
    /// after the server rejected the credential.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.state.lock() = SessionState::Error(message.into());
    }

    /// Paths in the order their requests were issued
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }

    /// Paths in the order their responses landed
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    /// Number of GET requests issued for `key`
    pub fn hits(&self, key: ResourceKey) -> u64 {
        let path = key.endpoint();
        self.issued.lock().iter().filter(|p| **p == path).count() as u64
    }

    /// Bodies posted so far, in order
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().clone()
    }

    pub fn logout_count(&self) -> u32 {
        *self.logouts.lock()
    }

    /// Forget the request log.
    pub fn clear_log(&self) {
        self.issued.lock().clear();
        self.completed.lock().clear();
    }

    /// Resolve the responder for a request and record that it was issued.
    fn dispatch(&self, path: &str) -> (SyncResult<Value>, Option<Duration>) {
        self.issued.lock().push(path.to_string());
        let (responder, ordinal, delay) = {
            let mut routes = self.routes.lock();
            match routes.get_mut(path) {
                Some(route) => {
                    let ordinal = route.hits;
                    route.hits += 1;
                    (Some(route.responder.clone()), ordinal, route.delay)
                }
                None => (None, 0, None),
            }
        };
        let result = match responder {
            Some(responder) => responder(ordinal),
            None => Err(SyncError::HttpStatus {
                path: path.to_string(),
                status: 404,
            }),
        };
        (result, delay)
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession for MemorySession {
    fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Value>> {
        Box::pin(async move {
            if !self.is_logged_in() {
                return Err(SyncError::Session("not logged in".to_string()));
            }
            let (result, delay) = self.dispatch(path);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            debug!(path, ok = result.is_ok(), "Memory GET landed");
            self.completed.lock().push(path.to_string());
            result
        })
    }

    fn post_json<'a>(&'a self, path: &'a str, body: &'a Value) -> BoxFuture<'a, SyncResult<Value>> {
        Box::pin(async move {
            if !self.is_logged_in() {
                return Err(SyncError::Session("not logged in".to_string()));
            }
            self.posts.lock().push((path.to_string(), body.clone()));
            let delay = self.routes.lock().get(path).and_then(|r| r.delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(json!({ "ok": true }))
        })
    }

    fn logout(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            *self.logouts.lock() += 1;
            *self.state.lock() = SessionState::LoggedOut;
        })
    }
}
