//! Session wiring for the request-orchestration stack.
//!
//! Combines the rate limiter, response cache, credential manager, service
//! client, and task aggregator into one owned unit. Nothing here is a
//! process-wide singleton: each [`ServiceSession`] carries its own state,
//! so multiple independent sessions (or tests) run in isolation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 ServiceSession                   │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────┐  │
//! │  │    Task    │ │    Api     │ │  Credential  │  │
//! │  │ Aggregator │ │   Client   │ │   Manager    │  │
//! │  └────────────┘ └────────────┘ └──────────────┘  │
//! │         ┌────────────┐ ┌──────────────┐          │
//! │         │  Response  │ │     Rate     │          │
//! │         │   Cache    │ │   Limiter    │          │
//! │         └────────────┘ └──────────────┘          │
//! └──────────────────────────────────────────────────┘
//! ```

use crate::api::cache::ResponseCache;
use crate::api::client::ApiClient;
use crate::api::rate_limiter::RateLimiter;
use crate::api::transport::{HttpTransport, Transport};
use crate::api::types::ApiError;
use crate::auth::{CredentialManager, SecretStore, ServiceTokenProbe};
use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::tree::TaskAggregator;
use std::sync::Arc;

/// One fully wired client session against a remote task service
pub struct ServiceSession {
    limiter: Arc<RateLimiter>,
    credentials: Arc<CredentialManager>,
    client: Arc<ApiClient>,
    aggregator: Arc<TaskAggregator>,
}

impl ServiceSession {
    /// Wire a session against the real HTTP transport
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let transport = Arc::new(HttpTransport::new(&config.service.base_url)?);
        Ok(Self::with_transport(config, transport, store, notifier))
    }

    /// Wire a session over an arbitrary transport. Tests use this with
    /// scripted transports to drive the whole stack without a network.
    pub fn with_transport(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_concurrent,
            config.rate_limit.interval,
        ));
        let cache = Arc::new(ResponseCache::new(config.cache.ttl));
        let probe = Arc::new(ServiceTokenProbe::new(
            Arc::clone(&transport),
            Arc::clone(&limiter),
            config.auth.refresh_bot.clone(),
        ));
        let credentials = Arc::new(CredentialManager::new(
            store,
            probe,
            Arc::clone(&notifier),
            config.auth.refresh_interval,
        ));
        let client = Arc::new(ApiClient::new(
            transport,
            Arc::clone(&limiter),
            cache,
            Arc::clone(&credentials),
        ));
        let aggregator = Arc::new(TaskAggregator::new(
            Arc::clone(&client),
            notifier,
            config.service.page_size,
        ));

        Self {
            limiter,
            credentials,
            client,
            aggregator,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn aggregator(&self) -> &Arc<TaskAggregator> {
        &self.aggregator
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Start the background credential refresh timer for this session
    pub fn start_background_refresh(&self) -> tokio::task::JoinHandle<()> {
        self.credentials.spawn_refresh()
    }
}
