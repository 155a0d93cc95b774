pub mod args;

pub use args::{Args, Command};

use crate::api::types::ContentKind;
use crate::auth::FileSecretStore;
use crate::config::ConfigDiscovery;
use crate::env;
use crate::integration::ServiceSession;
use crate::notify::LogNotifier;
use crate::tree::{ROOT_LISTING, TreeNode};
use anyhow::{Context, anyhow};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;

/// Execute one CLI command against a freshly wired session
pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ConfigDiscovery::discover_config()
        .map_err(|e| anyhow!("configuration error: {}", e))?;
    if let Some(base_url) = args.base_url {
        config.service.base_url = base_url;
    }

    let store = Arc::new(FileSecretStore::new(secrets_dir()?));
    let session = ServiceSession::new(config, store, Arc::new(LogNotifier))
        .context("failed to wire service session")?;
    session.credentials().restore().await?;

    match args.command {
        Command::Login { token } => {
            session.credentials().authenticate(&token).await?;
            println!("Signed in.");
        }
        Command::Logout => {
            session.credentials().sign_out().await?;
            println!("Signed out.");
        }
        Command::Tasks { more } => {
            let mut roots = session.aggregator().children(None).await;
            if more > 0 {
                for _ in 0..more {
                    session.aggregator().load_more(ROOT_LISTING).await;
                }
                // Category counts reflect the enlarged accumulation
                roots = session.aggregator().children(None).await;
            }
            if roots.is_empty() {
                println!("No tasks available.");
            }
            for root in &roots {
                print_subtree(&session, root, 0).await;
            }
        }
        Command::Search {
            query,
            index,
            from,
            size,
        } => {
            let results = session.client().search(&query, &index, from, size).await?;
            if let Some(total) = results.total {
                println!("{} results", total);
            }
            for hit in results.hits {
                println!(
                    "{} [{}]",
                    hit.name,
                    hit.entity_type.as_deref().unwrap_or("unknown")
                );
            }
        }
        Command::Asset { id } => {
            let view = session.client().asset_view(id).await?;
            let kind = match view.kind {
                ContentKind::Sql => "sql",
                ContentKind::Json => "json",
                ContentKind::Text => "text",
            };
            println!("# {} ({})", view.name, kind);
            println!("{}", view.content);
        }
        Command::Lineage {
            id,
            upstream,
            downstream,
        } => {
            let lineage = session.client().lineage(id, upstream, downstream).await?;
            println!(
                "{} upstream edge(s), {} downstream edge(s)",
                lineage.upstream_edges.len(),
                lineage.downstream_edges.len()
            );
        }
    }

    Ok(())
}

fn print_subtree<'a>(
    session: &'a ServiceSession,
    node: &'a TreeNode,
    depth: usize,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let indent = "  ".repeat(depth);
        match node.count {
            Some(count) => println!("{}{} ({})", indent, node.label, count),
            None => println!("{}{}", indent, node.label),
        }

        // Two-level walk: categories expand to projects, projects to tasks.
        if depth < 2 {
            let children = session.aggregator().children(Some(node)).await;
            for child in &children {
                print_subtree(session, child, depth + 1).await;
            }
        }
    })
}

fn secrets_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set; cannot locate the secret store"))?;
    Ok(env::secrets_dir_path(&home))
}
