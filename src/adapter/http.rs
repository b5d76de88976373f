use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{AccountIdentity, StackServer};
use crate::config::AccountConfig;
use crate::error::{ApiError, TransportError};
use crate::model::{Asset, ExistingStack, StackRef};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_ATTEMPTS: u32 = 3;
const BACKOFFS_MS: [u64; 3] = [500, 1000, 2000];

/// Talks to the remote library's REST API. Retry/backoff, pagination, and
/// dry-run no-ops live entirely here — `StackServer` callers never see an
/// HTTP concept.
pub struct HttpStackServer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    dry_run: bool,
}

impl HttpStackServer {
    pub fn new(account: &AccountConfig, dry_run: bool) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ApiError::Transport(TransportError::ClientBuild {
                    url: account.api_url.clone(),
                    message: e.to_string(),
                })
            })?;
        Ok(Self {
            client,
            base_url: account.api_url.trim_end_matches('/').to_string(),
            api_key: account.api_key.clone(),
            dry_run,
        })
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            tracing::debug!(url, %method, attempt, "adapter request");
            let mut req = self.client.request(method.clone(), url).header("x-api-key", &self.api_key);
            if let Some(b) = &body {
                req = req.json(b);
            }
            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        tracing::warn!(url, %status, attempt, "transient failure");
                        if attempt >= MAX_ATTEMPTS {
                            return Err(ApiError::Transport(TransportError::ServerError {
                                url: url.to_string(),
                                status: status.as_u16(),
                                attempts: attempt,
                            }));
                        }
                        tokio::time::sleep(Duration::from_millis(BACKOFFS_MS[(attempt - 1) as usize])).await;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, attempt, "network error");
                    if attempt >= MAX_ATTEMPTS {
                        return Err(ApiError::Transport(if e.is_timeout() {
                            TransportError::Timeout {
                                url: url.to_string(),
                                attempts: attempt,
                            }
                        } else {
                            TransportError::Network {
                                url: url.to_string(),
                                source: e,
                            }
                        }));
                    }
                    tokio::time::sleep(Duration::from_millis(BACKOFFS_MS[(attempt - 1) as usize])).await;
                }
            }
        }
    }

    async fn parse_ok<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        resp: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>().await.map_err(|e| ApiError::MalformedResponse {
            url: url.to_string(),
            source: e,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct StackWire {
    id: String,
    #[serde(rename = "primaryAssetId")]
    primary_asset_id: String,
    #[serde(rename = "assetIds")]
    asset_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AssetWire {
    id: String,
    #[serde(rename = "originalFileName")]
    original_file_name: String,
    #[serde(rename = "localDateTime")]
    local_date_time: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "originalPath")]
    original_path: String,
    #[serde(rename = "isArchived")]
    is_archived: bool,
    #[serde(rename = "isTrashed")]
    is_trashed: bool,
    #[serde(rename = "stackId")]
    stack_id: Option<String>,
}

#[async_trait::async_trait]
impl StackServer for HttpStackServer {
    async fn fetch_user(&self) -> Result<AccountIdentity, ApiError> {
        let url = format!("{}/api/users/me", self.base_url);
        let resp = self.send_with_retry(Method::GET, &url, None).await?;
        let me: MeResponse = self.parse_ok(&url, resp).await?;
        Ok(AccountIdentity {
            user_id: me.id,
            email: me.email,
        })
    }

    async fn fetch_existing_stacks(&self) -> Result<HashMap<String, ExistingStack>, ApiError> {
        let url = format!("{}/api/stacks", self.base_url);
        let resp = self.send_with_retry(Method::GET, &url, None).await?;
        let wire: Vec<StackWire> = self.parse_ok(&url, resp).await?;
        Ok(wire
            .into_iter()
            .map(|s| {
                (
                    s.id.clone(),
                    ExistingStack {
                        stack_id: s.id,
                        primary_asset_id: s.primary_asset_id,
                        member_ids: s.asset_ids,
                    },
                )
            })
            .collect())
    }

    async fn fetch_assets(
        &self,
        page_size: usize,
        with_archived: bool,
        with_trashed: bool,
        stacks: &HashMap<String, ExistingStack>,
    ) -> Result<Vec<Asset>, ApiError> {
        let mut out = Vec::new();
        let mut page = 1u64;
        loop {
            let url = format!(
                "{}/api/assets?page={}&size={}&withArchived={}&withTrashed={}",
                self.base_url, page, page_size, with_archived, with_trashed
            );
            let resp = self.send_with_retry(Method::GET, &url, None).await?;
            let wire: Vec<AssetWire> = self.parse_ok(&url, resp).await?;
            let got = wire.len();
            for a in wire {
                let stack_ref = a.stack_id.as_ref().and_then(|id| stacks.get(id)).map(|s| StackRef {
                    stack_id: s.stack_id.clone(),
                    primary_asset_id: s.primary_asset_id.clone(),
                    member_ids: s.member_ids.clone(),
                });
                out.push(Asset {
                    id: a.id,
                    original_filename: a.original_file_name,
                    local_datetime: a.local_date_time,
                    original_path: a.original_path,
                    is_archived: a.is_archived,
                    is_trashed: a.is_trashed,
                    stack_ref,
                });
            }
            if got < page_size {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    async fn write_stack(&self, asset_ids: &[String]) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(?asset_ids, "dry-run: skipping write_stack");
            return Ok(());
        }
        let url = format!("{}/api/stacks", self.base_url);
        let body = json!({ "assetIds": asset_ids });
        let resp = self.send_with_retry(Method::POST, &url, Some(body)).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn delete_stack(&self, stack_id: &str, reason: &str) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(stack_id, reason, "dry-run: skipping delete_stack");
            return Ok(());
        }
        let url = format!("{}/api/stacks/{}", self.base_url, stack_id);
        let resp = self.send_with_retry(Method::DELETE, &url, None).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn trash_assets(&self, asset_ids: &[String]) -> Result<(), ApiError> {
        if self.dry_run {
            tracing::info!(?asset_ids, "dry-run: skipping trash_assets");
            return Ok(());
        }
        let url = format!("{}/api/assets/trash", self.base_url);
        let body = json!({ "ids": asset_ids });
        let resp = self.send_with_retry(Method::PUT, &url, Some(body)).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
