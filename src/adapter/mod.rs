pub mod http;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{Asset, ExistingStack};

pub use http::HttpStackServer;
pub use memory::InMemoryStackServer;

/// Identity triple returned by `fetch_user`, used only for log context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub user_id: String,
    pub email: String,
}

/// The narrow capability set the planner and driver need from the remote
/// library. HTTP, auth, pagination, and retry/backoff are the
/// sole concern of implementors — everything above this trait deals only in
/// value types.
#[async_trait]
pub trait StackServer: Send + Sync {
    async fn fetch_user(&self) -> Result<AccountIdentity, ApiError>;

    async fn fetch_existing_stacks(&self) -> Result<HashMap<String, ExistingStack>, ApiError>;

    /// `stacks` is consulted to back-fill each asset's `stack_ref`.
    async fn fetch_assets(
        &self,
        page_size: usize,
        with_archived: bool,
        with_trashed: bool,
        stacks: &HashMap<String, ExistingStack>,
    ) -> Result<Vec<Asset>, ApiError>;

    /// `asset_ids[0]` becomes the parent; the rest become children.
    async fn write_stack(&self, asset_ids: &[String]) -> Result<(), ApiError>;

    /// `reason` is a log tag only — never sent to the server.
    async fn delete_stack(&self, stack_id: &str, reason: &str) -> Result<(), ApiError>;

    async fn trash_assets(&self, asset_ids: &[String]) -> Result<(), ApiError>;
}
