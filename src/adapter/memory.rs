use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AccountIdentity, StackServer};
use crate::error::ApiError;
use crate::model::{Asset, ExistingStack, StackRef};

/// In-process test double that drives deterministic scenarios without a
/// network. Records every mutating call it receives so tests can assert on
/// what the planner/driver actually issued.
pub struct InMemoryStackServer {
    state: Mutex<State>,
    dry_run: bool,
}

#[derive(Default)]
struct State {
    assets: Vec<Asset>,
    stacks: HashMap<String, ExistingStack>,
    written_stacks: Vec<Vec<String>>,
    deleted_stacks: Vec<(String, String)>,
    trashed: Vec<Vec<String>>,
}

impl InMemoryStackServer {
    pub fn new(assets: Vec<Asset>, stacks: HashMap<String, ExistingStack>) -> Self {
        Self::with_dry_run(assets, stacks, false)
    }

    pub fn with_dry_run(assets: Vec<Asset>, stacks: HashMap<String, ExistingStack>, dry_run: bool) -> Self {
        Self {
            state: Mutex::new(State {
                assets,
                stacks,
                ..Default::default()
            }),
            dry_run,
        }
    }

    pub fn written_stacks(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().written_stacks.clone()
    }

    pub fn deleted_stacks(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().deleted_stacks.clone()
    }

    pub fn trashed_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().trashed.clone()
    }

    /// Applies a recorded `write_stack`/`delete_stack` to the in-memory
    /// fixture itself, so a second fetch in the same test observes the
    /// converged state. Used by idempotence tests.
    pub fn apply_writes(&self) {
        let mut state = self.state.lock().unwrap();
        let written = state.written_stacks.clone();
        let deleted: Vec<String> = state.deleted_stacks.iter().map(|(id, _)| id.clone()).collect();
        for id in &deleted {
            state.stacks.remove(id);
        }
        for asset_ids in &written {
            let stack_id = format!("stack-{}", asset_ids[0]);
            let stack = ExistingStack {
                stack_id: stack_id.clone(),
                primary_asset_id: asset_ids[0].clone(),
                member_ids: asset_ids.clone(),
            };
            state.stacks.insert(stack_id.clone(), stack.clone());
            for asset in state.assets.iter_mut() {
                if asset_ids.contains(&asset.id) {
                    asset.stack_ref = Some(StackRef {
                        stack_id: stack.stack_id.clone(),
                        primary_asset_id: stack.primary_asset_id.clone(),
                        member_ids: stack.member_ids.clone(),
                    });
                }
            }
        }
        state.written_stacks.clear();
        state.deleted_stacks.clear();
    }
}

#[async_trait]
impl StackServer for InMemoryStackServer {
    async fn fetch_user(&self) -> Result<AccountIdentity, ApiError> {
        Ok(AccountIdentity {
            user_id: "test-user".to_string(),
            email: "test-user@example.test".to_string(),
        })
    }

    async fn fetch_existing_stacks(&self) -> Result<HashMap<String, ExistingStack>, ApiError> {
        Ok(self.state.lock().unwrap().stacks.clone())
    }

    async fn fetch_assets(
        &self,
        _page_size: usize,
        with_archived: bool,
        with_trashed: bool,
        _stacks: &HashMap<String, ExistingStack>,
    ) -> Result<Vec<Asset>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assets
            .iter()
            .filter(|a| with_archived || !a.is_archived)
            .filter(|a| with_trashed || !a.is_trashed)
            .cloned()
            .collect())
    }

    async fn write_stack(&self, asset_ids: &[String]) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(?asset_ids, "dry-run: skipping write_stack");
            return Ok(());
        }
        self.state.lock().unwrap().written_stacks.push(asset_ids.to_vec());
        Ok(())
    }

    async fn delete_stack(&self, stack_id: &str, reason: &str) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(stack_id, reason, "dry-run: skipping delete_stack");
            return Ok(());
        }
        self.state
            .lock()
            .unwrap()
            .deleted_stacks
            .push((stack_id.to_string(), reason.to_string()));
        Ok(())
    }

    async fn trash_assets(&self, asset_ids: &[String]) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(?asset_ids, "dry-run: skipping trash_assets");
            return Ok(());
        }
        self.state.lock().unwrap().trashed.push(asset_ids.to_vec());
        Ok(())
    }
}
