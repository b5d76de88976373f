use crate::adapter::StackServer;
use crate::cluster;
use crate::config::Config;

/// `fix-trash` command: cluster `trashed ∪ active` under the
/// same predicate tree used for stacking, and trash every active asset that
/// lands in a cluster alongside a trashed one (e.g. the JPEG half of a pair
/// whose RAW sibling was trashed). Returns the number of assets trashed.
pub async fn run(server: &impl StackServer, config: &Config) -> usize {
    let stacks = match server.fetch_existing_stacks().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "fetch_existing_stacks failed");
            return 0;
        }
    };
    let assets = match server
        .fetch_assets(config.run_options.page_size, config.run_options.with_archived, true, &stacks)
        .await
    {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "fetch_assets failed");
            return 0;
        }
    };

    let clusters = cluster::cluster(assets, &config.predicate_tree);

    let mut to_trash = Vec::new();
    for group in &clusters {
        if !group.iter().any(|a| a.is_trashed) {
            continue;
        }
        for asset in group {
            if !asset.is_trashed {
                to_trash.push(asset.id.clone());
            }
        }
    }

    if to_trash.is_empty() {
        return 0;
    }

    tracing::info!(count = to_trash.len(), ids = ?to_trash, "trashing assets to match trashed cluster-mates");
    match server.trash_assets(&to_trash).await {
        Ok(()) => to_trash.len(),
        Err(e) => {
            tracing::error!(error = %e, "trash_assets failed");
            0
        }
    }
}
