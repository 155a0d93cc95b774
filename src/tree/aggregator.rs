use crate::api::client::ApiClient;
use crate::api::types::{ApiError, Task};
use crate::notify::{Notifier, Severity};
use crate::tree::node::{NodeKind, StatusFilter, TreeNode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Listing identity of the root task view
pub const ROOT_LISTING: &str = "root";

/// Project display key for tasks without a project reference
pub const UNGROUPED_KEY: &str = "ungrouped";

/// Pages of one logical listing accumulated so far.
///
/// Append-only: pages are concatenated in fetch order, never reordered and
/// never deduplicated — a task appearing twice across pages would be a
/// server contract violation, not something resolved here. `total` is the
/// server-side figure from the first page, not the local count.
#[derive(Debug, Default)]
struct Bucket {
    tasks: Vec<Task>,
    cursor: Option<String>,
    total: Option<u64>,
}

/// Turns the cursor-paginated task listing into a stable, incrementally
/// expandable tree grouped by project and open/closed status.
///
/// The grouping view is never stored; it is recomputed from the bucket on
/// every expansion request. Expansion failures are caught here — logged,
/// surfaced through the notifier, and degraded to an empty child list — so
/// a failed fetch never tears down nodes the host already renders.
pub struct TaskAggregator {
    client: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
    page_size: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
    stale: watch::Sender<u64>,
}

impl TaskAggregator {
    pub fn new(client: Arc<ApiClient>, notifier: Arc<dyn Notifier>, page_size: u32) -> Self {
        let (stale, _) = watch::channel(0);
        Self {
            client,
            notifier,
            page_size,
            buckets: Mutex::new(HashMap::new()),
            stale,
        }
    }

    /// Child nodes of `parent`, or the category roots when `parent` is
    /// absent. Never fails; a fetch error yields an empty list.
    pub async fn children(&self, parent: Option<&TreeNode>) -> Vec<TreeNode> {
        match parent {
            None => self.root_nodes().await,
            Some(node) => match &node.kind {
                NodeKind::Category { filter } => self.category_children(*filter).await,
                NodeKind::Project { name, filter } => self.project_children(name, *filter).await,
                NodeKind::Task { .. } | NodeKind::LoadMore { .. } => Vec::new(),
            },
        }
    }

    /// Fetch exactly one more page for `listing` and append it to the
    /// bucket. Does not recurse to exhaustion. A failure leaves the
    /// existing accumulation intact and appends nothing.
    ///
    /// Callers must serialize invocations per listing identity (for example
    /// by disabling the action while a fetch is outstanding): two
    /// overlapping calls would reuse the same stale cursor and append the
    /// same page twice.
    pub async fn load_more(&self, listing: &str) {
        let cursor = {
            let buckets = self.buckets.lock().await;
            buckets.get(listing).and_then(|b| b.cursor.clone())
        };
        let Some(cursor) = cursor else {
            debug!(listing, "load more requested but listing is exhausted");
            return;
        };

        match self.client.list_tasks(self.page_size, Some(&cursor)).await {
            Ok(page) => {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets.entry(listing.to_string()).or_default();
                debug!(
                    listing,
                    appended = page.items.len(),
                    exhausted = page.after.is_none(),
                    "appended page to accumulation"
                );
                bucket.tasks.extend(page.items);
                bucket.cursor = page.after;
                if bucket.total.is_none() {
                    bucket.total = page.total;
                }
            }
            Err(e) => self.report_failure("loading more tasks", &e),
        }
    }

    /// Drop every accumulation bucket and cached response unconditionally
    /// and signal observers that the rendered tree is stale from the root.
    /// No partial or targeted invalidation is provided.
    pub async fn refresh(&self) {
        self.buckets.lock().await.clear();
        self.client.clear_cache();
        self.stale.send_modify(|generation| *generation += 1);
        info!("task tree refreshed; all accumulations cleared");
    }

    /// Observe staleness generations; a change means re-render from root
    pub fn subscribe_invalidations(&self) -> watch::Receiver<u64> {
        self.stale.subscribe()
    }

    async fn root_nodes(&self) -> Vec<TreeNode> {
        if let Err(e) = self.ensure_first_page(ROOT_LISTING).await {
            self.report_failure("loading tasks", &e);
            return Vec::new();
        }

        let buckets = self.buckets.lock().await;
        let Some(bucket) = buckets.get(ROOT_LISTING) else {
            return Vec::new();
        };

        let open = count_matching(&bucket.tasks, StatusFilter::Open);
        let completed = count_matching(&bucket.tasks, StatusFilter::Completed);
        vec![
            // "All" carries the server-reported total verbatim; it may
            // exceed what has been paged in locally.
            TreeNode::category(StatusFilter::All, bucket.total),
            TreeNode::category(StatusFilter::Open, Some(open)),
            TreeNode::category(StatusFilter::Completed, Some(completed)),
        ]
    }

    async fn category_children(&self, filter: StatusFilter) -> Vec<TreeNode> {
        if let Err(e) = self.ensure_first_page(ROOT_LISTING).await {
            self.report_failure("loading tasks", &e);
            return Vec::new();
        }

        let buckets = self.buckets.lock().await;
        let Some(bucket) = buckets.get(ROOT_LISTING) else {
            return Vec::new();
        };

        let mut nodes: Vec<TreeNode> = group_by_project(&bucket.tasks, filter)
            .into_iter()
            .map(|(name, count)| TreeNode::project(&name, filter, count))
            .collect();
        if bucket.cursor.is_some() {
            nodes.push(TreeNode::load_more(ROOT_LISTING));
        }
        nodes
    }

    async fn project_children(&self, project: &str, filter: StatusFilter) -> Vec<TreeNode> {
        let buckets = self.buckets.lock().await;
        let Some(bucket) = buckets.get(ROOT_LISTING) else {
            return Vec::new();
        };

        bucket
            .tasks
            .iter()
            .filter(|task| filter.matches(task.status) && project_key(task) == project)
            .map(TreeNode::task)
            .collect()
    }

    /// Fetch the first page for `listing` unless a bucket already exists.
    async fn ensure_first_page(&self, listing: &str) -> Result<(), ApiError> {
        if self.buckets.lock().await.contains_key(listing) {
            return Ok(());
        }

        let page = self.client.list_tasks(self.page_size, None).await?;
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(listing.to_string()).or_default();
        if bucket.tasks.is_empty() {
            debug!(
                listing,
                items = page.items.len(),
                total = ?page.total,
                "seeded accumulation with first page"
            );
            bucket.tasks = page.items;
            bucket.cursor = page.after;
            bucket.total = page.total;
        }
        Ok(())
    }

    fn report_failure(&self, action: &str, error: &ApiError) {
        warn!("tree expansion failed while {}: {}", action, error);
        self.notifier
            .notify(Severity::Error, &format!("Failed {}: {}", action, error));
    }
}

/// Derived grouping view: project display key to matching-task count, in
/// first-seen order across the accumulated pages. Projects with zero
/// matching tasks do not appear. Pure function of the bucket contents.
fn group_by_project(tasks: &[Task], filter: StatusFilter) -> Vec<(String, u64)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();

    for task in tasks.iter().filter(|t| filter.matches(t.status)) {
        let key = project_key(task);
        if !counts.contains_key(&key) {
            order.push(key.clone());
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    order
        .into_iter()
        .map(|name| {
            let count = counts.get(&name).copied().unwrap_or(0);
            (name, count)
        })
        .collect()
}

fn count_matching(tasks: &[Task], filter: StatusFilter) -> u64 {
    tasks.iter().filter(|t| filter.matches(t.status)).count() as u64
}

fn project_key(task: &Task) -> String {
    task.project
        .as_ref()
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| UNGROUPED_KEY.to_string())
}
