use crate::api::types::{Task, TaskId, TaskStatus};
use serde::Serialize;

/// Category-level status restriction applied while walking the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusFilter {
    All,
    Open,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Open => status == TaskStatus::Open,
            Self::Completed => status == TaskStatus::Closed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Open => "Open",
            Self::Completed => "Completed",
        }
    }

    fn key_part(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }
}

/// Classification tag carried by every node; hosts use it to pick an icon
/// and action set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    Category { filter: StatusFilter },
    Project { name: String, filter: StatusFilter },
    Task { id: TaskId },
    LoadMore { listing: String },
}

/// One node of the lazy category → project → task hierarchy.
///
/// `key` is a stable identity a presentation layer can use to track
/// expansion state across recomputations of the tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub label: String,
    pub key: String,
    pub count: Option<u64>,
    pub kind: NodeKind,
}

impl TreeNode {
    pub fn category(filter: StatusFilter, count: Option<u64>) -> Self {
        Self {
            label: filter.label().to_string(),
            key: format!("category:{}", filter.key_part()),
            count,
            kind: NodeKind::Category { filter },
        }
    }

    pub fn project(name: &str, filter: StatusFilter, count: u64) -> Self {
        Self {
            label: name.to_string(),
            key: format!("project:{}:{}", filter.key_part(), name),
            count: Some(count),
            kind: NodeKind::Project {
                name: name.to_string(),
                filter,
            },
        }
    }

    pub fn task(task: &Task) -> Self {
        Self {
            label: task.name.clone(),
            key: format!("task:{}", task.id),
            count: None,
            kind: NodeKind::Task { id: task.id },
        }
    }

    /// Synthetic continuation node appended while a cursor is outstanding
    pub fn load_more(listing: &str) -> Self {
        Self {
            label: "Load more...".to_string(),
            key: format!("loadmore:{}", listing),
            count: None,
            kind: NodeKind::LoadMore {
                listing: listing.to_string(),
            },
        }
    }
}
