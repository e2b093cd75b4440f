//! `reqwest`-backed session against the game API

use futures::future::BoxFuture;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AuthSession, SessionState};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Bearer-token session over HTTP
///
/// The token is obtained elsewhere (the game's token-auth flow); this type
/// only attaches it. A 401 or 403 from any endpoint flips the session into
/// `SessionState::Error` so the synchronizer can end it.
pub struct HttpSession {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
    error: RwLock<Option<String>>,
}

impl HttpSession {
    /// Create a logged-in session with default settings.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> SyncResult<Self> {
        Self::with_config(base_url, token, &SyncConfig::default())
    }

    /// Create a logged-in session using the transport settings in `config`.
    pub fn with_config(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        let mut builder = Client::builder().tcp_keepalive(config.tcp_keepalive);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let base_url = base_url.into();
        info!(%base_url, "Created HTTP session");
        Ok(Self {
            client,
            base_url,
            token: RwLock::new(Some(token.into())),
            error: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn token(&self) -> SyncResult<String> {
        self.token
            .read()
            .clone()
            .ok_or_else(|| SyncError::Session("not logged in".to_string()))
    }

    async fn decode(&self, path: &str, response: Response) -> SyncResult<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(path, status = status.as_u16(), "Credential rejected");
            *self.error.write() = Some(format!("credential rejected ({})", status.as_u16()));
        }
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SyncError::InvalidJson {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl AuthSession for HttpSession {
    fn state(&self) -> SessionState {
        if let Some(message) = self.error.read().clone() {
            return SessionState::Error(message);
        }
        if self.token.read().is_some() {
            SessionState::Active
        } else {
            SessionState::LoggedOut
        }
    }

    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SyncResult<Value>> {
        Box::pin(async move {
            let token = self.token()?;
            debug!(path, "GET");
            let response = self
                .client
                .get(self.url(path))
                .bearer_auth(token)
                .send()
                .await?;
            self.decode(path, response).await
        })
    }

    fn post_json<'a>(&'a self, path: &'a str, body: &'a Value) -> BoxFuture<'a, SyncResult<Value>> {
        Box::pin(async move {
            let token = self.token()?;
            debug!(path, "POST");
            let response = self
                .client
                .post(self.url(path))
                .bearer_auth(token)
                .json(body)
                .send()
                .await?;
            self.decode(path, response).await
        })
    }

    fn logout(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(base_url = %self.base_url, "Logging out");
            *self.token.write() = None;
            *self.error.write() = None;
        })
    }
}
