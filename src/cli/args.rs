use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Demo host for the taskview orchestration layer
#[derive(Debug, Parser)]
#[command(name = "taskview", version, about)]
pub struct Args {
    /// Override the configured service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a bearer token against the service and store it
    Login {
        #[arg(long, env = "TASKVIEW_TOKEN")]
        token: String,
    },
    /// Erase the stored credential
    Logout,
    /// Print the task tree (category → project → task)
    Tasks {
        /// Number of extra pages to pull in via the load-more path
        #[arg(long, default_value_t = 0)]
        more: u32,
    },
    /// Full-text search over catalog assets
    Search {
        query: String,
        #[arg(long, default_value = "all")]
        index: String,
        #[arg(long, default_value_t = 0)]
        from: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// Show the normalized content view of an asset
    Asset { id: Uuid },
    /// Show the lineage graph around an entity
    Lineage {
        id: Uuid,
        #[arg(long, default_value_t = 1)]
        upstream: u32,
        #[arg(long, default_value_t = 1)]
        downstream: u32,
    },
}
