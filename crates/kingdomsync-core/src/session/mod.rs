//! Auth/session collaborators
//!
//! The synchronizer never talks HTTP directly. It goes through an
//! `AuthSession`, which knows whether the player is logged in, attaches the
//! bearer credential to every request, and can log the player out.
//!
//! ## Implementations
//!
//! - [`HttpSession`]: `reqwest` client against the game API
//! - [`MemorySession`]: canned responses, for fixtures and tests

mod http;
mod memory;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::SyncResult;

pub use http::HttpSession;
pub use memory::MemorySession;

/// State of the player's session as reported by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Logged in with a usable credential
    Active,
    /// No credential
    LoggedOut,
    /// The session carries an error; fatal for the whole client
    Error(String),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

/// Authenticated access to the game API
///
/// Paths are relative to the API base (`"api/kingdom"`).
pub trait AuthSession: Send + Sync + 'static {
    /// Current session state
    fn state(&self) -> SessionState;

    /// Whether the player is logged in
    fn is_logged_in(&self) -> bool {
        self.state().is_active()
    }

    /// GET `path` with the bearer credential and parse the body as JSON
    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Value>>;

    /// POST a JSON body to `path` and parse the JSON reply
    fn post_json<'a>(&'a self, path: &'a str, body: &'a Value) -> BoxFuture<'a, SyncResult<Value>>;

    /// Drop the credential
    fn logout(&self) -> BoxFuture<'_, ()>;
}
