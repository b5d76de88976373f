use std::collections::{HashMap, HashSet};

use crate::error::PlanError;
use crate::model::{Asset, ExistingStack, PlannedAction, RunOptions};

/// Diff ordered desired clusters against the server's existing stacks and
/// emit the minimal action list to converge. Guard-rail rejections (a
/// cluster that would produce a degenerate stack) are returned alongside the
/// actions rather than aborting the run — the offending cluster is simply
/// skipped.
pub fn plan(
    clusters: Vec<Vec<Asset>>,
    existing_stacks: &HashMap<String, ExistingStack>,
    options: &RunOptions,
) -> (Vec<PlannedAction>, Vec<PlanError>) {
    let mut actions = Vec::new();
    let mut rejections = Vec::new();
    let mut deleted_ids: HashSet<String> = HashSet::new();

    if options.reset_stacks {
        for stack in existing_stacks.values() {
            if deleted_ids.insert(stack.stack_id.clone()) {
                actions.push(PlannedAction::DeleteStack {
                    stack_id: stack.stack_id.clone(),
                    reason: "reset_stacks".to_string(),
                });
            }
        }
    }

    for cluster in clusters {
        if cluster.len() < 2 {
            if options.remove_single_asset_stacks {
                if let Some(member) = cluster.first() {
                    if let Some(stack_ref) = &member.stack_ref {
                        let is_singleton = existing_stacks
                            .get(&stack_ref.stack_id)
                            .map(|s| s.member_ids.len() == 1)
                            .unwrap_or(false);
                        if is_singleton && deleted_ids.insert(stack_ref.stack_id.clone()) {
                            actions.push(PlannedAction::DeleteStack {
                                stack_id: stack_ref.stack_id.clone(),
                                reason: "remove_single_asset_stacks".to_string(),
                            });
                        }
                    }
                }
            }
            continue;
        }

        let parent_id = cluster[0].id.clone();
        let mut seen = HashSet::new();
        let new_ids: Vec<String> = cluster
            .iter()
            .map(|a| a.id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if new_ids.len() < 2 {
            tracing::debug!(parent = %parent_id, "cluster would produce an invalid stack, skipping");
            rejections.push(PlanError::InvalidStack {
                parent: parent_id,
                reason: "fewer than 2 distinct asset ids after deduplication".to_string(),
            });
            continue;
        }

        let current_stack_id = cluster[0].stack_ref.as_ref().map(|r| r.stack_id.clone());
        let child_prior_stack_ids: HashSet<String> = cluster[1..]
            .iter()
            .filter_map(|d| d.stack_ref.as_ref())
            .map(|r| r.stack_id.clone())
            .filter(|id| Some(id) != current_stack_id.as_ref())
            .collect();

        let current_ids = cluster[0].current_stack_ids();
        if current_ids == new_ids {
            continue; // already converged, nothing to do
        }

        if !child_prior_stack_ids.is_empty() && !options.replace_stacks {
            tracing::debug!(parent = %parent_id, "children carry prior stacks and replace_stacks is false, skipping");
            continue;
        }

        for stack_id in &child_prior_stack_ids {
            if deleted_ids.insert(stack_id.clone()) {
                actions.push(PlannedAction::DeleteStack {
                    stack_id: stack_id.clone(),
                    reason: "replace child with new stack".to_string(),
                });
            }
        }
        actions.push(PlannedAction::WriteStack { asset_ids: new_ids });
    }

    (actions, rejections)
}
