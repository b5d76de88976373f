use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stack already recorded on the server: one primary plus its members.
/// `member_ids` includes the primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingStack {
    pub stack_id: String,
    pub primary_asset_id: String,
    pub member_ids: Vec<String>,
}

/// The stack an asset currently belongs to, as back-filled onto the asset by
/// the server adapter from the `existing_stacks` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRef {
    pub stack_id: String,
    pub primary_asset_id: String,
    pub member_ids: Vec<String>,
}

/// Identity and the descriptive attributes criteria/ordering consult.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub original_filename: String,
    pub local_datetime: DateTime<Utc>,
    pub original_path: String,
    pub is_archived: bool,
    pub is_trashed: bool,
    /// Absent iff the asset is currently unstacked.
    pub stack_ref: Option<StackRef>,
}

impl Asset {
    /// Primary id followed by member ids in stored order, or empty when the
    /// asset is unstacked.
    pub fn current_stack_ids(&self) -> Vec<String> {
        match &self.stack_ref {
            Some(r) => {
                let mut ids = vec![r.primary_asset_id.clone()];
                ids.extend(r.member_ids.iter().cloned().filter(|m| m != &r.primary_asset_id));
                ids
            }
            None => Vec::new(),
        }
    }
}

/// An ordered, non-empty list of assets destined to become one stack.
/// Index 0 is the parent.
pub type DesiredCluster = Vec<Asset>;

/// A single server mutation the planner wants applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    DeleteStack { stack_id: String, reason: String },
    /// `asset_ids[0]` is the new parent; the rest are children.
    WriteStack { asset_ids: Vec<String> },
}

/// Terminal process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    General = 1,
    Configuration = 2,
    Api = 3,
    StackOperation = 4,
}

/// Policy flags threaded into the planner and adapter, built once from
/// `Config` and never mutated for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub replace_stacks: bool,
    pub remove_single_asset_stacks: bool,
    pub reset_stacks: bool,
    pub with_archived: bool,
    pub with_trashed: bool,
    pub page_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            replace_stacks: true,
            remove_single_asset_stacks: false,
            reset_stacks: false,
            with_archived: false,
            with_trashed: false,
            page_size: 1000,
        }
    }
}
