//! Authenticated, throttled, cached access to the remote task service.
//!
//! Every operation follows the same order: the stored credential is checked
//! first (no credential means no network attempt and no rate-limit budget
//! spent), then the response cache, and only on a miss is a rate-limiter
//! permit taken and the call dispatched. Writes are never cached.
//!
//! ## Failure classification
//!
//! Every response is classified into the [`ApiError`] taxonomy: a 4xx
//! answer (notably 401 and 404) becomes `AuthOrNotFound` with a remediation
//! hint, a connection-level failure becomes `Transport`, and everything
//! else — 5xx answers, malformed envelopes — becomes `Unexpected`. A 401
//! additionally signals credential invalidity to the credential manager's
//! observers.

use crate::api::cache::{ResponseCache, cache_key};
use crate::api::rate_limiter::RateLimiter;
use crate::api::transport::{ApiRequest, Transport};
use crate::api::types::{
    ApiError, AssetView, ContentKind, Envelope, EntityId, EntityKind, Lineage, Page, SearchHit,
    SearchResults, Task, TaskId, TaskPatch, TestCaseResult,
};
use crate::auth::CredentialManager;
use crate::env::endpoints;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    credentials: Arc<CredentialManager>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            transport,
            limiter,
            cache,
            credentials,
        }
    }

    /// Drop every cached response; the next reads go back to the service.
    pub fn clear_cache(&self) {
        self.cache.clear_all();
    }

    /// List tasks, one page at a time. `after` is the opaque continuation
    /// cursor from the previous page.
    pub async fn list_tasks(&self, limit: u32, after: Option<&str>) -> Result<Page<Task>, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key("list_tasks", &[&limit.to_string(), after.unwrap_or("")]);

        let mut request = ApiRequest::get(endpoints::TASKS)
            .query("limit", limit.to_string())
            .bearer(token);
        if let Some(after) = after {
            request = request.query("after", after);
        }

        let envelope = self.cached_get(&key, request).await?;
        let items: Vec<Task> = serde_json::from_value(envelope.data).map_err(malformed)?;
        let (after, total) = envelope
            .paging
            .map(|p| (p.after, p.total))
            .unwrap_or((None, None));
        Ok(Page { items, after, total })
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key("get_task", &[&id.to_string()]);
        let request = ApiRequest::get(format!("{}/{}", endpoints::TASKS, id)).bearer(token);
        let envelope = self.cached_get(&key, request).await?;
        serde_json::from_value(envelope.data).map_err(malformed)
    }

    /// Apply a partial update to a task. Writes bypass the cache entirely;
    /// the stale read entry for the task is dropped so the next read
    /// observes the patched state.
    pub async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let token = self.require_token().await?;
        let body = serde_json::to_value(patch).map_err(malformed)?;
        let request = ApiRequest::patch(format!("{}/{}", endpoints::TASKS, id), body).bearer(token);
        let value = self.dispatch(request).await?;
        self.cache.invalidate(&cache_key("get_task", &[&id.to_string()]));
        serde_json::from_value(Envelope::normalize(value).data).map_err(malformed)
    }

    /// Normalized "content + content-kind" view of a catalog asset.
    ///
    /// Dispatches on the entity kind: tabular entities yield their rendered
    /// definition text tagged SQL-like, dashboards yield the serialized
    /// chart structure tagged as structured data, and everything else falls
    /// back to a generic serialized form.
    pub async fn asset_view(&self, id: EntityId) -> Result<AssetView, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key("get_entity", &[&id.to_string()]);
        let request =
            ApiRequest::get(format!("{}/{}", endpoints::ENTITIES, id)).bearer(token);
        let envelope = self.cached_get(&key, request).await?;
        let entity = envelope.data;

        let name = entity
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        let entity_type = entity
            .get("entityType")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown");

        let (content, kind) = match EntityKind::from_entity_type(entity_type) {
            EntityKind::Table => (self.entity_definition(id).await?, ContentKind::Sql),
            EntityKind::Dashboard => {
                let charts = entity.get("charts").unwrap_or(&entity);
                (
                    serde_json::to_string_pretty(charts).map_err(malformed)?,
                    ContentKind::Json,
                )
            }
            EntityKind::Other(_) => (
                serde_json::to_string_pretty(&entity).map_err(malformed)?,
                ContentKind::Text,
            ),
        };

        Ok(AssetView {
            entity_id: id,
            name,
            content,
            kind,
        })
    }

    /// Lineage graph around an entity, bounded in both directions
    pub async fn lineage(
        &self,
        id: EntityId,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> Result<Lineage, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key(
            "lineage",
            &[
                &id.to_string(),
                &upstream_depth.to_string(),
                &downstream_depth.to_string(),
            ],
        );
        let request = ApiRequest::get(format!("{}/{}", endpoints::LINEAGE, id))
            .query("upstreamDepth", upstream_depth.to_string())
            .query("downstreamDepth", downstream_depth.to_string())
            .bearer(token);
        let envelope = self.cached_get(&key, request).await?;
        serde_json::from_value(envelope.data).map_err(malformed)
    }

    /// Full-text search over catalog assets
    pub async fn search(
        &self,
        q: &str,
        index: &str,
        from: u32,
        size: u32,
    ) -> Result<SearchResults, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key(
            "search",
            &[q, index, &from.to_string(), &size.to_string()],
        );
        let request = ApiRequest::get(endpoints::SEARCH)
            .query("q", q)
            .query("index", index)
            .query("from", from.to_string())
            .query("size", size.to_string())
            .bearer(token);
        let envelope = self.cached_get(&key, request).await?;

        let hits_block = envelope.data.get("hits").cloned().unwrap_or(Value::Null);
        let total = hits_block
            .get("total")
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_u64());
        let raw_hits = hits_block
            .get("hits")
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();

        let mut hits = Vec::with_capacity(raw_hits.len());
        for raw in raw_hits {
            let source = raw.get("_source").cloned().unwrap_or(raw);
            let hit: SearchHit = serde_json::from_value(source).map_err(malformed)?;
            hits.push(hit);
        }
        Ok(SearchResults { hits, total })
    }

    /// Data-quality results for a test case, optionally bounded in time
    /// (epoch milliseconds).
    pub async fn test_case_results(
        &self,
        test_case_fqn: &str,
        start_ts: Option<i64>,
        end_ts: Option<i64>,
    ) -> Result<Vec<TestCaseResult>, ApiError> {
        let token = self.require_token().await?;
        let start_arg = start_ts.map(|t| t.to_string()).unwrap_or_default();
        let end_arg = end_ts.map(|t| t.to_string()).unwrap_or_default();
        let key = cache_key(
            "test_case_results",
            &[test_case_fqn, &start_arg, &end_arg],
        );

        let mut request = ApiRequest::get(format!(
            "{}/{}/results",
            endpoints::TEST_CASE_RESULTS,
            test_case_fqn
        ))
        .bearer(token);
        if let Some(start) = start_ts {
            request = request.query("startTs", start.to_string());
        }
        if let Some(end) = end_ts {
            request = request.query("endTs", end.to_string());
        }

        let envelope = self.cached_get(&key, request).await?;
        serde_json::from_value(envelope.data).map_err(malformed)
    }

    /// Fetch the privileged token of a named automation bot
    pub async fn bot_token(&self, bot_name: &str) -> Result<String, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key("bot_token", &[bot_name]);
        let request =
            ApiRequest::get(format!("{}/{}/token", endpoints::BOTS, bot_name)).bearer(token);
        let envelope = self.cached_get(&key, request).await?;
        envelope
            .data
            .get("accessToken")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string())
            .ok_or_else(|| ApiError::Unexpected("bot token payload missing accessToken".to_string()))
    }

    /// Rendered definition text of an entity (tabular assets)
    async fn entity_definition(&self, id: EntityId) -> Result<String, ApiError> {
        let token = self.require_token().await?;
        let key = cache_key("entity_definition", &[&id.to_string()]);
        let request =
            ApiRequest::get(format!("{}/{}/definition", endpoints::ENTITIES, id)).bearer(token);
        let envelope = self.cached_get(&key, request).await?;

        match envelope.data {
            Value::String(text) => Ok(text),
            other => other
                .get("definition")
                .and_then(|d| d.as_str())
                .map(|d| d.to_string())
                .ok_or_else(|| {
                    ApiError::Unexpected("definition payload missing definition text".to_string())
                }),
        }
    }

    /// Fast precondition: a stored credential must exist before any cache
    /// check, rate-limiter acquisition, or network attempt.
    async fn require_token(&self) -> Result<String, ApiError> {
        self.credentials
            .token()
            .await
            .ok_or(ApiError::NotAuthenticated)
    }

    /// Read path: cache first, network on miss. Cache hits never touch the
    /// rate limiter.
    async fn cached_get(&self, key: &str, request: ApiRequest) -> Result<Envelope, ApiError> {
        let payload = self
            .cache
            .get_or_fetch(key, || async { self.dispatch(request).await })
            .await?;
        Ok(Envelope::normalize(payload))
    }

    /// Throttled dispatch and classification of a single call
    async fn dispatch(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let _permit = self.limiter.acquire().await;
        debug!(path = %request.path, "dispatching service call");

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            let error = ApiError::from_status(response.status, &response.body);
            if error.is_unauthorized() {
                self.credentials.note_unauthorized();
            }
            return Err(error);
        }

        serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Unexpected(format!("malformed response body: {}", e)))
    }
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    ApiError::Unexpected(format!("malformed envelope: {}", e))
}
