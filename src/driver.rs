use std::time::Duration;

use crate::adapter::{HttpStackServer, StackServer};
use crate::cluster;
use crate::config::{Config, RunMode};
use crate::error::ApiError;
use crate::model::PlannedAction;
use crate::parent;
use crate::plan;

const ACTION_RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 3];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: usize,
    pub applied: usize,
    pub failed: usize,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.emitted += other.emitted;
        self.applied += other.applied;
        self.failed += other.failed;
    }
}

/// Fetch → cluster → order → plan → apply for every configured account, once
/// (`RunMode::Once`) or forever on a `CRON_INTERVAL` cadence (`RunMode::Cron`).
/// Accounts are processed strictly sequentially — each gets a fresh adapter
/// instance with its own API key.
pub async fn drive(config: &Config) -> RunSummary {
    match config.run_mode {
        RunMode::Once => run_once(config).await,
        RunMode::Cron => run_cron(config).await,
    }
}

async fn run_cron(config: &Config) -> RunSummary {
    let mut last = RunSummary::default();
    loop {
        last = run_once(config).await;
        tracing::info!(
            emitted = last.emitted,
            applied = last.applied,
            failed = last.failed,
            "cron pass complete"
        );
        let sleep = tokio::time::sleep(Duration::from_secs(config.cron_interval_secs));
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            _ = wait_for_termination() => {
                tracing::info!("termination signal received, exiting cron loop");
                break;
            }
        }
    }
    last
}

#[cfg(unix)]
async fn wait_for_termination() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_once(config: &Config) -> RunSummary {
    let mut summary = RunSummary::default();
    for account in &config.accounts {
        match HttpStackServer::new(account, config.run_options.dry_run) {
            Ok(server) => summary.merge(run_account(&server, config).await),
            Err(e) => tracing::error!(error = %e, "failed to build HTTP client, skipping account"),
        }
    }
    summary
}

/// Generic over `StackServer` so tests can drive this with
/// `InMemoryStackServer` instead of a real HTTP connection.
pub async fn run_account<S: StackServer>(server: &S, config: &Config) -> RunSummary {
    let mut summary = RunSummary::default();

    let identity = match server.fetch_user().await {
        Ok(i) => i,
        Err(e) => {
            tracing::error!(error = %e, "fetch_user failed, skipping account");
            return summary;
        }
    };
    tracing::info!(user_id = %identity.user_id, email = %identity.email, "starting run");

    let stacks = match server.fetch_existing_stacks().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, user_id = %identity.user_id, "fetch_existing_stacks failed, skipping account");
            return summary;
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
            tracing::error!(error = %e, user_id = %identity.user_id, "fetch_assets failed, skipping account");
            return summary;
        }
    };

    let mut clusters = cluster::cluster(assets, &config.predicate_tree);
    for c in clusters.iter_mut() {
        parent::order_cluster(c, &config.predicate_tree, &config.parent_selection);
    }

    let (actions, rejections) = plan::plan(clusters, &stacks, &config.run_options);
    for rejection in &rejections {
        tracing::debug!(?rejection, "plan rejected a cluster");
    }

    summary.emitted = actions.len();
    for action in &actions {
        match apply_with_retry(server, action).await {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(error = %e, ?action, "action failed after retries, continuing");
            }
        }
    }
    summary
}

/// Driver-level retry for semantic write failures, distinct from the
/// transport-level retry inside the adapter.
async fn apply_with_retry<S: StackServer>(server: &S, action: &PlannedAction) -> Result<(), ApiError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = match action {
            PlannedAction::DeleteStack { stack_id, reason } => server.delete_stack(stack_id, reason).await,
            PlannedAction::WriteStack { asset_ids } => server.write_stack(asset_ids).await,
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if (attempt as usize) < ACTION_RETRY_DELAYS_SECS.len() => {
                tracing::warn!(error = %e, attempt, ?action, "action failed, retrying");
                tokio::time::sleep(Duration::from_secs(ACTION_RETRY_DELAYS_SECS[(attempt - 1) as usize])).await;
            }
            Err(e) => return Err(e),
        }
    }
}
