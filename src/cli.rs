use clap::{Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::config::{Config, LogFormat};
use crate::error::AppError;

/// Groups related assets in a remote photo library into stacks and
/// reconciles them against the server. Every environment variable has a
/// matching flag here; flags win when both are set.
#[derive(Parser, Debug)]
#[command(name = "stackkeep", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long)]
    pub api_url: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub run_mode: Option<String>,
    #[arg(long)]
    pub cron_interval: Option<String>,
    #[arg(long)]
    pub dry_run: Option<bool>,
    #[arg(long)]
    pub reset_stacks: Option<bool>,
    #[arg(long)]
    pub confirm_reset_stack: Option<String>,
    #[arg(long)]
    pub replace_stacks: Option<bool>,
    #[arg(long)]
    pub remove_single_asset_stacks: Option<bool>,
    #[arg(long)]
    pub with_archived: Option<bool>,
    #[arg(long)]
    pub with_deleted: Option<bool>,
    #[arg(long)]
    pub criteria: Option<String>,
    #[arg(long)]
    pub parent_filename_promote: Option<String>,
    #[arg(long)]
    pub parent_ext_promote: Option<String>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub log_format: Option<String>,
    #[arg(long)]
    pub log_file: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum Command {
    /// Group assets into stacks and reconcile with the server. The default.
    #[default]
    Stack,
    /// List groups of assets sharing a filename and capture time.
    Duplicates,
    /// Trash active assets clustered alongside an already-trashed asset.
    FixTrash,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }

    pub fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url,
            api_key: self.api_key,
            run_mode: self.run_mode,
            cron_interval: self.cron_interval,
            dry_run: self.dry_run,
            reset_stacks: self.reset_stacks,
            confirm_reset_stack: self.confirm_reset_stack,
            replace_stacks: self.replace_stacks,
            remove_single_asset_stacks: self.remove_single_asset_stacks,
            with_archived: self.with_archived,
            with_deleted: self.with_deleted,
            criteria: self.criteria,
            parent_filename_promote: self.parent_filename_promote,
            parent_ext_promote: self.parent_ext_promote,
            log_level: self.log_level,
            log_format: self.log_format,
            log_file: self.log_file,
        }
    }
}

/// Initializes `tracing-subscriber` from `config.log_level`/`log_format`/
/// `log_file`, the same `tracing_subscriber::fmt` setup generalized to a
/// configurable sink.
pub fn init_logging(config: &Config) -> Result<(), AppError> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .map_err(|e| AppError::General(format!("invalid LOG_LEVEL \"{}\": {e}", config.log_level)))?;

    let result = match (config.log_format, &config.log_file) {
        (LogFormat::Pretty, None) => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        (LogFormat::Json, None) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        (LogFormat::Pretty, Some(path)) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(move || file.try_clone().expect("clone log file handle"))
                .try_init()
        }
        (LogFormat::Json, Some(path)) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(move || file.try_clone().expect("clone log file handle"))
                .try_init()
        }
    };
    result.map_err(|e| AppError::General(format!("failed to initialize logging: {e}")))
}

fn open_log_file(path: &str) -> Result<std::fs::File, AppError> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::General(format!("failed to open LOG_FILE {path}: {e}")))
}
