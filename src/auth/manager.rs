use crate::api::rate_limiter::RateLimiter;
use crate::api::transport::{ApiRequest, Transport};
use crate::api::types::{ApiError, Envelope};
use crate::auth::secrets::{SecretStore, SecretStoreError};
use crate::env;
use crate::notify::{Notifier, Severity};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

/// State changes published to observers of the credential lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    /// A refresh replaced the stored token with a new value
    Refreshed,
    /// The credential was rejected; the user must authenticate again
    ReauthRequired,
    /// A refresh attempt failed transiently; the stored token is untouched
    RefreshFailed(String),
}

/// Outcome classification for a failed token refresh.
///
/// Distinguishes "token expired, re-auth required" from "transient, keep
/// the existing token" — a transient error must never silently
/// deauthenticate the user.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("token expired, sign in again")]
    Expired,
    #[error("transient refresh failure: {0}")]
    Transient(ApiError),
}

/// Remote checks backing the credential lifecycle: a lightweight
/// authenticated probe for `authenticate` and the periodic refresh call.
#[async_trait]
pub trait TokenProbe: Send + Sync {
    async fn validate(&self, token: &str) -> Result<(), ApiError>;
    async fn refresh(&self, token: &str) -> Result<String, RefreshError>;
}

/// Probe implementation against the real service: an identity lookup to
/// validate, and the automation bot token endpoint to refresh. Both calls
/// take a rate-limiter permit like every other outbound call.
pub struct ServiceTokenProbe {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    bot_name: String,
}

impl ServiceTokenProbe {
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, bot_name: String) -> Self {
        Self {
            transport,
            limiter,
            bot_name,
        }
    }
}

#[async_trait]
impl TokenProbe for ServiceTokenProbe {
    async fn validate(&self, token: &str) -> Result<(), ApiError> {
        let _permit = self.limiter.acquire().await;
        let response = self
            .transport
            .execute(ApiRequest::get(env::endpoints::WHOAMI).bearer(token))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if (200..300).contains(&response.status) {
            Ok(())
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    async fn refresh(&self, token: &str) -> Result<String, RefreshError> {
        let _permit = self.limiter.acquire().await;
        let path = format!("{}/{}/token", env::endpoints::BOTS, self.bot_name);
        let response = self
            .transport
            .execute(ApiRequest::get(path).bearer(token))
            .await
            .map_err(|e| RefreshError::Transient(ApiError::Transport(e.to_string())))?;

        match response.status {
            200..=299 => {
                let value: serde_json::Value = serde_json::from_str(&response.body)
                    .map_err(|e| {
                        RefreshError::Transient(ApiError::Unexpected(format!(
                            "malformed refresh payload: {}",
                            e
                        )))
                    })?;
                let envelope = Envelope::normalize(value);
                envelope
                    .data
                    .get("accessToken")
                    .and_then(|t| t.as_str())
                    .map(|t| t.to_string())
                    .ok_or_else(|| {
                        RefreshError::Transient(ApiError::Unexpected(
                            "refresh payload missing accessToken".to_string(),
                        ))
                    })
            }
            401 => Err(RefreshError::Expired),
            status => Err(RefreshError::Transient(ApiError::from_status(
                status,
                &response.body,
            ))),
        }
    }
}

/// Owner of the bearer token lifecycle: storage, validation on sign-in,
/// periodic silent refresh, and invalidation on failure.
///
/// The token is a single string read by every service call and written only
/// here; readers always see the latest committed value. It is cleared by
/// explicit sign-out or an expired refresh — never by transient failures.
pub struct CredentialManager {
    secret_name: String,
    store: Arc<dyn SecretStore>,
    probe: Arc<dyn TokenProbe>,
    notifier: Arc<dyn Notifier>,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
    refresh_interval: Duration,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn SecretStore>,
        probe: Arc<dyn TokenProbe>,
        notifier: Arc<dyn Notifier>,
        refresh_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            secret_name: env::TOKEN_SECRET_NAME.to_string(),
            store,
            probe,
            notifier,
            token: RwLock::new(None),
            events,
            refresh_interval,
        }
    }

    /// Load a previously persisted token into memory without validating it.
    /// Returns whether one was found.
    pub async fn restore(&self) -> Result<bool, SecretStoreError> {
        let stored = self.store.get(&self.secret_name).await?;
        let found = stored.is_some();
        *self.token.write().await = stored;
        if found {
            debug!("restored persisted credential");
        }
        Ok(found)
    }

    /// Validate `token` against the service with a lightweight probe call;
    /// on success persist it and transition to the authenticated state.
    /// On failure the credential stays unset and the error surfaces to the
    /// caller — no retry happens here.
    pub async fn authenticate(&self, token: &str) -> Result<(), ApiError> {
        self.probe.validate(token).await?;

        if let Err(e) = self.store.set(&self.secret_name, token).await {
            return Err(ApiError::Unexpected(format!(
                "token accepted but could not be persisted: {}",
                e
            )));
        }
        *self.token.write().await = Some(token.to_string());
        let _ = self.events.send(AuthEvent::SignedIn);
        info!("authenticated against the service");
        self.notifier.notify(Severity::Info, "Signed in.");
        Ok(())
    }

    /// Latest committed token, if any
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Erase the credential from memory and the secret store
    pub async fn sign_out(&self) -> Result<(), SecretStoreError> {
        *self.token.write().await = None;
        self.store.delete(&self.secret_name).await?;
        let _ = self.events.send(AuthEvent::SignedOut);
        info!("signed out");
        Ok(())
    }

    /// Observe credential lifecycle transitions
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Record that the service rejected the current credential (401).
    /// Observers are told re-authentication is required; the stored token is
    /// left in place so an explicit sign-out or expired refresh remains the
    /// only paths that clear it.
    pub fn note_unauthorized(&self) {
        warn!("service rejected the current credential");
        let _ = self.events.send(AuthEvent::ReauthRequired);
    }

    /// One refresh attempt, the same step the background timer runs.
    pub async fn refresh_now(&self) {
        let current = self.token.read().await.clone();
        let Some(current) = current else {
            debug!("refresh skipped, no credential stored");
            return;
        };

        match self.probe.refresh(&current).await {
            Ok(new_token) => {
                *self.token.write().await = Some(new_token.clone());
                if let Err(e) = self.store.set(&self.secret_name, &new_token).await {
                    warn!("refreshed token could not be persisted: {}", e);
                }
                let _ = self.events.send(AuthEvent::Refreshed);
                debug!("credential refreshed");
            }
            Err(RefreshError::Expired) => {
                *self.token.write().await = None;
                if let Err(e) = self.store.delete(&self.secret_name).await {
                    warn!("expired token could not be removed from store: {}", e);
                }
                let _ = self.events.send(AuthEvent::ReauthRequired);
                self.notifier
                    .notify(Severity::Warning, "Session expired. Sign in again.");
            }
            Err(RefreshError::Transient(e)) => {
                // Keep the existing token; a network hiccup is not a reason
                // to force the user back through sign-in.
                warn!("credential refresh failed transiently: {}", e);
                let _ = self.events.send(AuthEvent::RefreshFailed(e.to_string()));
            }
        }
    }

    /// Start the background refresh timer. The task runs until aborted via
    /// the returned handle.
    pub fn spawn_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(manager.refresh_interval).await;
                manager.refresh_now().await;
            }
        })
    }
}
