use std::env;

use crate::criteria::{self, PredicateNode};
use crate::error::ConfigError;
use crate::model::RunOptions;
use crate::parent::ParentSelectionConfig;

const CONFIRM_RESET_TOKEN: &str = "yes-delete-my-stacks";

/// One library account: a base URL shared by every account plus its own
/// API key. `API_KEY` may be comma-separated to run multiple accounts
/// against the same `API_URL`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Cron,
}

/// Fully validated run configuration, built once from environment variables
/// and CLI overrides and threaded read-only through the driver — never
/// mutated after construction, so a later account in the loop can't observe
/// an earlier account's changes because there are none to observe.
#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: Vec<AccountConfig>,
    pub run_mode: RunMode,
    pub cron_interval_secs: u64,
    pub predicate_tree: PredicateNode,
    pub parent_selection: ParentSelectionConfig,
    pub run_options: RunOptions,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Raw, unvalidated overrides a CLI flag can supply on top of the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub run_mode: Option<String>,
    pub cron_interval: Option<String>,
    pub dry_run: Option<bool>,
    pub reset_stacks: Option<bool>,
    pub confirm_reset_stack: Option<String>,
    pub replace_stacks: Option<bool>,
    pub remove_single_asset_stacks: Option<bool>,
    pub with_archived: Option<bool>,
    pub with_deleted: Option<bool>,
    pub criteria: Option<String>,
    pub parent_filename_promote: Option<String>,
    pub parent_ext_promote: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<String>,
}

fn env_or(key: &str, fallback: Option<String>) -> Option<String> {
    fallback.or_else(|| env::var(key).ok())
}

fn env_bool(key: &str, fallback: Option<bool>, default: bool) -> bool {
    fallback.unwrap_or_else(|| {
        env::var(key)
            .ok()
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(default)
    })
}

impl Config {
    /// Build and validate a `Config` from the process environment, with
    /// `overrides` (typically parsed CLI flags) taking precedence.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let api_url = env_or("API_URL", overrides.api_url).ok_or(ConfigError::Missing("API_URL"))?;
        let api_key_raw = env_or("API_KEY", overrides.api_key).ok_or(ConfigError::Missing("API_KEY"))?;
        if api_url.trim().is_empty() || api_key_raw.trim().is_empty() {
            return Err(ConfigError::Missing("API_URL/API_KEY must be non-empty"));
        }
        let accounts: Vec<AccountConfig> = api_key_raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|key| AccountConfig {
                api_url: api_url.clone(),
                api_key: key.to_string(),
            })
            .collect();
        if accounts.is_empty() {
            return Err(ConfigError::Missing("API_KEY"));
        }

        let run_mode_raw =
            env_or("RUN_MODE", overrides.run_mode).unwrap_or_else(|| "once".to_string());
        let run_mode = match run_mode_raw.as_str() {
            "once" => RunMode::Once,
            "cron" => RunMode::Cron,
            other => return Err(ConfigError::InvalidRunMode(other.to_string())),
        };

        let cron_interval_raw =
            env_or("CRON_INTERVAL", overrides.cron_interval).unwrap_or_else(|| "86400".to_string());
        let cron_interval_secs: u64 = cron_interval_raw
            .parse()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| ConfigError::InvalidCronInterval(cron_interval_raw.clone()))?;

        let dry_run = env_bool("DRY_RUN", overrides.dry_run, false);
        let reset_stacks = env_bool("RESET_STACKS", overrides.reset_stacks, false);
        let confirm_reset_stack =
            env_or("CONFIRM_RESET_STACK", overrides.confirm_reset_stack).unwrap_or_default();
        if reset_stacks && (confirm_reset_stack != CONFIRM_RESET_TOKEN || run_mode != RunMode::Once)
        {
            return Err(ConfigError::IllegalFlagCombination);
        }

        let replace_stacks = env_bool("REPLACE_STACKS", overrides.replace_stacks, true);
        let remove_single_asset_stacks =
            env_bool("REMOVE_SINGLE_ASSET_STACKS", overrides.remove_single_asset_stacks, false);
        let with_archived = env_bool("WITH_ARCHIVED", overrides.with_archived, false);
        let with_trashed = env_bool("WITH_DELETED", overrides.with_deleted, false);

        let criteria_raw = env_or("CRITERIA", overrides.criteria).unwrap_or_default();
        let predicate_tree = criteria::parser::parse_criteria(&criteria_raw)?;

        let parent_selection = ParentSelectionConfig {
            filename_promote: split_csv_or_default(
                env_or("PARENT_FILENAME_PROMOTE", overrides.parent_filename_promote),
                "cover,edit,crop,hdr,biggestNumber",
            ),
            ext_promote: split_csv_or_default(
                env_or("PARENT_EXT_PROMOTE", overrides.parent_ext_promote),
                ".jpg,.png,.jpeg,.heic,.dng",
            ),
        };

        let log_level = env_or("LOG_LEVEL", overrides.log_level).unwrap_or_else(|| "info".to_string());
        let log_format = match env_or("LOG_FORMAT", overrides.log_format)
            .unwrap_or_else(|| "pretty".to_string())
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let log_file = env_or("LOG_FILE", overrides.log_file);

        Ok(Config {
            accounts,
            run_mode,
            cron_interval_secs,
            predicate_tree,
            parent_selection,
            run_options: RunOptions {
                dry_run,
                replace_stacks,
                remove_single_asset_stacks,
                reset_stacks,
                with_archived,
                with_trashed,
                page_size: 1000,
            },
            log_level,
            log_format,
            log_file,
        })
    }
}

fn split_csv_or_default(value: Option<String>, default: &str) -> Vec<String> {
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.split(',').map(|s| s.to_string()).collect()
}
