//! # Taskview
//!
//! Client-side orchestration layer that presents a remote task service's
//! data — tasks, grouped by project and status, paginated — inside a
//! long-lived host process, without overwhelming the remote service and
//! without paying network latency on every interaction.
//!
//! ## Architecture Overview
//!
//! The system consists of several key components organized into modules:
//!
//! - **[`api`]**: Rate limiting, response caching, and the typed service client
//! - **[`auth`]**: Bearer-token lifecycle with periodic silent refresh
//! - **[`tree`]**: Aggregation of paginated task pages into a lazy node hierarchy
//! - **[`integration`]**: Session wiring combining all components
//!
//! ## Features
//!
//! ### 🚦 Request Orchestration
//! - **Rate Limiting**: FIFO permit queue with fixed-interval release
//! - **Response Caching**: Time-boxed deduplication of repeated reads
//! - **Failure Classification**: Every call mapped into a small error taxonomy
//!
//! ### 🔑 Credential Lifecycle
//! - **Probe-Validated Sign-In**: Tokens are checked against the service before storage
//! - **Silent Refresh**: Fixed-interval background refresh that never
//!   deauthenticates on a transient failure
//! - **Observer Events**: Broadcast notifications for sign-in, sign-out, and expiry
//!
//! ### 🌲 Task Tree
//! - **Accumulation Buckets**: Pages concatenated per listing identity
//! - **Derived Grouping**: Project × status view recomputed on demand
//! - **Incremental Loading**: A synthetic "load more" node fetches one page at a time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskview::{AppConfig, InMemorySecretStore, LogNotifier, ServiceSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = ServiceSession::new(
//!         AppConfig::default(),
//!         Arc::new(InMemorySecretStore::new()),
//!         Arc::new(LogNotifier),
//!     )?;
//!
//!     session.credentials().authenticate("bearer-token").await?;
//!     for node in session.aggregator().children(None).await {
//!         println!("{}", node.label);
//!     }
//!     Ok(())
//! }
//! ```

/// Rate limiting, response caching, transport seam, and the typed client
/// for the remote task service.
pub mod api;

/// Credential lifecycle management and the secret storage contract.
pub mod auth;

/// Aggregation of the paginated task listing into a lazy,
/// incrementally-expandable node hierarchy.
pub mod tree;

/// Session wiring combining all subsystems into one owned unit.
pub mod integration;

/// Host notification surface: message content and severity only.
pub mod notify;

/// Configuration structures, TOML loading, and discovery hierarchy.
pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes endpoint paths, secret names, and directory names used
/// throughout the crate.
pub mod env;

// Re-export main API types
pub use api::{
    ApiClient, ApiError, AssetView, ContentKind, EntityKind, EntityRef, HttpTransport, Lineage,
    Page, RateLimiter, ResponseCache, SearchResults, Tag, Task, TaskId, TaskPatch, TaskStatus,
    TestCaseResult, Transport,
};

// Re-export credential types
pub use auth::{
    AuthEvent, CredentialManager, FileSecretStore, InMemorySecretStore, RefreshError, SecretStore,
};

// Re-export tree types
pub use tree::{NodeKind, StatusFilter, TaskAggregator, TreeNode};

// Re-export session and configuration types
pub use config::{AppConfig, ConfigDiscovery};
pub use integration::ServiceSession;
pub use notify::{LogNotifier, Notifier, Severity};

// CLI module for the demo host binary
pub mod cli;
