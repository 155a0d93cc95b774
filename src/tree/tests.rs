use super::*;
use crate::api::{
    ApiClient, ApiRequest, RateLimiter, RawResponse, ResponseCache, TaskStatus, Transport,
    TransportFailure,
};
use crate::auth::{CredentialManager, InMemorySecretStore, RefreshError, SecretStore, TokenProbe};
use crate::env;
use crate::notify::{Notifier, Severity};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

// ---- shared test plumbing ----

#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportFailure>>>,
    calls: AtomicU64,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn push_ok(&self, status: u16, body: Value) {
        self.responses.lock().await.push_back(Ok(RawResponse {
            status,
            body: body.to_string(),
        }));
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, _request: ApiRequest) -> Result<RawResponse, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Ok(RawResponse {
                    status: 500,
                    body: "unscripted call".to_string(),
                })
            })
    }
}

struct AcceptProbe;

#[async_trait]
impl TokenProbe for AcceptProbe {
    async fn validate(&self, _token: &str) -> Result<(), crate::api::ApiError> {
        Ok(())
    }

    async fn refresh(&self, token: &str) -> Result<String, RefreshError> {
        Ok(token.to_string())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: StdMutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    fn errors(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(severity, _)| *severity == Severity::Error)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

struct Harness {
    transport: Arc<ScriptedTransport>,
    notifier: Arc<RecordingNotifier>,
    aggregator: TaskAggregator,
}

async fn harness(page_size: u32) -> Harness {
    let transport = ScriptedTransport::new();
    let limiter = Arc::new(RateLimiter::new(8, Duration::from_millis(100)));
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(300)));
    let store: Arc<dyn SecretStore> = Arc::new(InMemorySecretStore::new());
    store.set(env::TOKEN_SECRET_NAME, "token-abc").await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let credentials = Arc::new(CredentialManager::new(
        Arc::clone(&store),
        Arc::new(AcceptProbe),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Duration::from_secs(1500),
    ));
    credentials.restore().await.unwrap();

    let client = Arc::new(ApiClient::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        limiter,
        cache,
        credentials,
    ));
    let aggregator = TaskAggregator::new(
        client,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        page_size,
    );

    Harness {
        transport,
        notifier,
        aggregator,
    }
}

fn task_json(name: &str, status: &str, project: Option<&str>) -> Value {
    let mut task = json!({
        "id": Uuid::new_v4(),
        "name": name,
        "description": "",
        "entityId": Uuid::new_v4(),
        "entityType": "table",
        "type": "RequestDescription",
        "status": status,
        "assignees": [],
        "tags": [],
        "createdAt": 1_700_000_000_000_i64,
        "updatedAt": 1_700_000_000_000_i64,
    });
    if let Some(project) = project {
        task["project"] = json!({ "name": project, "type": "project" });
    }
    task
}

fn page_json(tasks: Vec<Value>, after: Option<&str>, total: u64) -> Value {
    let mut paging = json!({ "total": total });
    if let Some(after) = after {
        paging["after"] = json!(after);
    }
    json!({ "data": tasks, "paging": paging })
}

fn find<'a>(nodes: &'a [TreeNode], label: &str) -> &'a TreeNode {
    nodes
        .iter()
        .find(|n| n.label == label)
        .unwrap_or_else(|| panic!("no node labeled {:?} in {:?}", label, nodes))
}

fn has_load_more(nodes: &[TreeNode]) -> bool {
    nodes
        .iter()
        .any(|n| matches!(n.kind, NodeKind::LoadMore { .. }))
}

// ---- root categories ----

#[tokio::test]
async fn root_exposes_categories_with_server_total_on_all() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(
                vec![
                    task_json("t1", "Open", Some("Alpha")),
                    task_json("t2", "Open", None),
                    task_json("t3", "Closed", Some("Alpha")),
                ],
                Some("c1"),
                12,
            ),
        )
        .await;

    let roots = h.aggregator.children(None).await;
    assert_eq!(roots.len(), 3);

    // "All" reports the server-side total even though only one page is in
    let all = find(&roots, "All");
    assert_eq!(all.count, Some(12));
    assert_eq!(find(&roots, "Open").count, Some(2));
    assert_eq!(find(&roots, "Completed").count, Some(1));
}

#[tokio::test]
async fn root_reuses_the_populated_bucket_without_refetching() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(vec![task_json("t1", "Open", None)], None, 1),
        )
        .await;

    h.aggregator.children(None).await;
    h.aggregator.children(None).await;
    assert_eq!(h.transport.calls(), 1);
}

// ---- grouping ----

#[tokio::test]
async fn grouping_partitions_by_project_and_status() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(
                vec![
                    task_json("t1", "Open", Some("A")),
                    task_json("t2", "Closed", Some("A")),
                    task_json("t3", "Open", None),
                ],
                None,
                3,
            ),
        )
        .await;

    let roots = h.aggregator.children(None).await;

    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].label, "A");
    assert_eq!(open[0].count, Some(1));
    assert_eq!(open[1].label, UNGROUPED_KEY);
    assert_eq!(open[1].count, Some(1));

    // A project with zero matching tasks is omitted, not shown with zero
    let completed = h.aggregator.children(Some(find(&roots, "Completed"))).await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].label, "A");
    assert_eq!(completed[0].count, Some(1));
}

#[tokio::test]
async fn projects_appear_in_first_seen_order_not_alphabetical() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(
                vec![
                    task_json("t1", "Open", Some("Zeta")),
                    task_json("t2", "Open", Some("Alpha")),
                    task_json("t3", "Open", Some("Zeta")),
                ],
                None,
                3,
            ),
        )
        .await;

    let roots = h.aggregator.children(None).await;
    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;

    let labels: Vec<&str> = open.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["Zeta", "Alpha"]);
    assert_eq!(find(&open, "Zeta").count, Some(2));
}

#[tokio::test]
async fn project_children_are_leaves_filtered_by_the_category_status() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(
                vec![
                    task_json("fix-desc", "Open", Some("A")),
                    task_json("approve-tag", "Closed", Some("A")),
                    task_json("other", "Open", Some("B")),
                ],
                None,
                3,
            ),
        )
        .await;

    let roots = h.aggregator.children(None).await;
    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    let completed = h.aggregator.children(Some(find(&roots, "Completed"))).await;

    let open_a = h.aggregator.children(Some(find(&open, "A"))).await;
    assert_eq!(open_a.len(), 1);
    assert_eq!(open_a[0].label, "fix-desc");
    assert!(matches!(open_a[0].kind, NodeKind::Task { .. }));

    let completed_a = h.aggregator.children(Some(find(&completed, "A"))).await;
    assert_eq!(completed_a.len(), 1);
    assert_eq!(completed_a[0].label, "approve-tag");
}

#[tokio::test]
async fn tasks_keep_server_return_order_within_a_group() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(
                vec![
                    task_json("third", "Open", Some("A")),
                    task_json("first", "Open", Some("A")),
                    task_json("second", "Open", Some("A")),
                ],
                None,
                3,
            ),
        )
        .await;

    let roots = h.aggregator.children(None).await;
    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    let leaves = h.aggregator.children(Some(find(&open, "A"))).await;

    let labels: Vec<&str> = leaves.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["third", "first", "second"]);
}

// ---- pagination ----

#[tokio::test]
async fn load_more_appends_one_page_and_exhaustion_drops_the_node() {
    let h = harness(5).await;
    let first: Vec<Value> = (0..5)
        .map(|i| task_json(&format!("t{}", i), "Open", Some("A")))
        .collect();
    let second: Vec<Value> = (5..8)
        .map(|i| task_json(&format!("t{}", i), "Open", Some("A")))
        .collect();
    h.transport.push_ok(200, page_json(first, Some("c1"), 8)).await;
    h.transport.push_ok(200, page_json(second, None, 8)).await;

    let roots = h.aggregator.children(None).await;
    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    assert!(has_load_more(&open));
    assert_eq!(open.last().unwrap().key, format!("loadmore:{}", ROOT_LISTING));

    h.aggregator.load_more(ROOT_LISTING).await;

    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    assert!(!has_load_more(&open), "exhausted listing keeps no load-more node");
    assert_eq!(find(&open, "A").count, Some(8));

    let leaves = h.aggregator.children(Some(find(&open, "A"))).await;
    assert_eq!(leaves.len(), 8);
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test]
async fn load_more_on_an_exhausted_listing_is_a_no_op() {
    let h = harness(50).await;
    h.transport
        .push_ok(200, page_json(vec![task_json("t1", "Open", None)], None, 1))
        .await;

    h.aggregator.children(None).await;
    h.aggregator.load_more(ROOT_LISTING).await;
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn failed_load_more_leaves_existing_nodes_intact() {
    let h = harness(5).await;
    let first: Vec<Value> = (0..5)
        .map(|i| task_json(&format!("t{}", i), "Open", Some("A")))
        .collect();
    h.transport.push_ok(200, page_json(first, Some("c1"), 8)).await;
    h.transport.push_ok(500, json!({ "message": "boom" })).await;

    let roots = h.aggregator.children(None).await;
    h.aggregator.load_more(ROOT_LISTING).await;

    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    assert_eq!(find(&open, "A").count, Some(5));
    assert!(has_load_more(&open), "cursor survives a failed fetch");
    assert_eq!(h.notifier.errors(), 1);
}

// ---- failure boundary ----

#[tokio::test]
async fn expansion_failures_degrade_to_an_empty_child_list() {
    let h = harness(50).await;
    h.transport.push_ok(500, json!({ "message": "boom" })).await;

    let roots = h.aggregator.children(None).await;
    assert!(roots.is_empty());
    assert_eq!(h.notifier.errors(), 1);

    // The failure did not poison the view; the next expansion retries
    h.transport
        .push_ok(200, page_json(vec![task_json("t1", "Open", None)], None, 1))
        .await;
    let roots = h.aggregator.children(None).await;
    assert_eq!(roots.len(), 3);
}

#[tokio::test]
async fn leaf_and_load_more_nodes_have_no_children() {
    let h = harness(50).await;
    h.transport
        .push_ok(200, page_json(vec![task_json("t1", "Open", None)], Some("c1"), 2))
        .await;

    let roots = h.aggregator.children(None).await;
    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    let leaves = h
        .aggregator
        .children(Some(find(&open, UNGROUPED_KEY)))
        .await;

    assert!(h.aggregator.children(Some(&leaves[0])).await.is_empty());
    let load_more = open.iter().find(|n| matches!(n.kind, NodeKind::LoadMore { .. }));
    assert!(
        h.aggregator
            .children(Some(load_more.unwrap()))
            .await
            .is_empty()
    );
}

// ---- refresh ----

#[tokio::test]
async fn refresh_clears_buckets_and_cache_and_signals_staleness() {
    let h = harness(50).await;
    h.transport
        .push_ok(200, page_json(vec![task_json("t1", "Open", None)], None, 1))
        .await;
    h.transport
        .push_ok(200, page_json(vec![task_json("t2", "Closed", None)], None, 1))
        .await;

    let mut staleness = h.aggregator.subscribe_invalidations();
    h.aggregator.children(None).await;

    h.aggregator.refresh().await;
    assert!(staleness.has_changed().unwrap());
    assert_eq!(*staleness.borrow_and_update(), 1);

    // Both the bucket and the response cache are gone; this refetches
    let roots = h.aggregator.children(None).await;
    assert_eq!(find(&roots, "Completed").count, Some(1));
    assert_eq!(find(&roots, "Open").count, Some(0));
    assert_eq!(h.transport.calls(), 2);
}

// ---- node identity ----

#[tokio::test]
async fn node_keys_are_stable_identities() {
    let h = harness(50).await;
    h.transport
        .push_ok(
            200,
            page_json(vec![task_json("t1", "Open", Some("A"))], Some("c1"), 2),
        )
        .await;

    let roots = h.aggregator.children(None).await;
    assert_eq!(find(&roots, "All").key, "category:all");
    assert_eq!(find(&roots, "Open").key, "category:open");
    assert_eq!(find(&roots, "Completed").key, "category:completed");

    let open = h.aggregator.children(Some(find(&roots, "Open"))).await;
    assert_eq!(find(&open, "A").key, "project:open:A");
    assert!(open.last().unwrap().key.starts_with("loadmore:"));
}

#[test]
fn status_filter_matches_the_right_statuses() {
    assert!(StatusFilter::All.matches(TaskStatus::Open));
    assert!(StatusFilter::All.matches(TaskStatus::Closed));
    assert!(StatusFilter::Open.matches(TaskStatus::Open));
    assert!(!StatusFilter::Open.matches(TaskStatus::Closed));
    assert!(StatusFilter::Completed.matches(TaskStatus::Closed));
    assert!(!StatusFilter::Completed.matches(TaskStatus::Open));
}
