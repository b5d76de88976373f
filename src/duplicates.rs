use std::collections::HashMap;

use crate::adapter::StackServer;
use crate::config::Config;
use crate::model::Asset;

/// `duplicates` command: group assets by
/// `(original_filename, local_datetime)` and report every group of size > 1.
/// Read-only — issues no mutating adapter calls.
pub async fn run(server: &impl StackServer, config: &Config) -> Vec<Vec<Asset>> {
    let stacks = match server.fetch_existing_stacks().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "fetch_existing_stacks failed");
            return Vec::new();
        }
    };
    let assets = match server
        .fetch_assets(
            config.run_options.page_size,
            config.run_options.with_archived,
            config.run_options.with_trashed,
            &stacks,
        )
        .await
    {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "fetch_assets failed");
            return Vec::new();
        }
    };

    let groups = find_duplicates(assets);
    for group in &groups {
        let filenames: Vec<&str> = group.iter().map(|a| a.original_filename.as_str()).collect();
        tracing::info!(count = group.len(), filenames = ?filenames, "duplicate group");
    }
    groups
}

fn find_duplicates(assets: Vec<Asset>) -> Vec<Vec<Asset>> {
    let mut groups: HashMap<(String, i64), Vec<Asset>> = HashMap::new();
    for asset in assets {
        let key = (asset.original_filename.clone(), asset.local_datetime.timestamp_millis());
        groups.entry(key).or_default().push(asset);
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}
