use clap::Parser;

use stackkeep::adapter::HttpStackServer;
use stackkeep::cli::{init_logging, Cli, Command};
use stackkeep::config::Config;
use stackkeep::model::ExitCode;
use stackkeep::{driver, duplicates, trash};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command();
    let overrides = cli.into_overrides();

    let config = match Config::load(overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(ExitCode::Configuration as i32);
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(ExitCode::General as i32);
    }

    let exit_code = match command {
        Command::Stack => {
            let summary = driver::drive(&config).await;
            tracing::info!(
                emitted = summary.emitted,
                applied = summary.applied,
                failed = summary.failed,
                "run summary"
            );
            if summary.failed > 0 {
                ExitCode::StackOperation
            } else {
                ExitCode::Success
            }
        }
        Command::Duplicates => {
            for_each_account(&config, |server, config| Box::pin(async move {
                duplicates::run(server, config).await;
            }))
            .await;
            ExitCode::Success
        }
        Command::FixTrash => {
            for_each_account(&config, |server, config| Box::pin(async move {
                trash::run(server, config).await;
            }))
            .await;
            ExitCode::Success
        }
    };

    std::process::exit(exit_code as i32);
}

/// Builds a fresh adapter per account and runs `f` against each, matching
/// the driver's strictly-sequential per-account processing for the
/// auxiliary commands too.
async fn for_each_account<F>(config: &Config, f: F)
where
    F: for<'a> Fn(&'a HttpStackServer, &'a Config) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>>,
{
    for account in &config.accounts {
        match HttpStackServer::new(account, config.run_options.dry_run) {
            Ok(server) => f(&server, config).await,
            Err(e) => tracing::error!(error = %e, "failed to build HTTP client, skipping account"),
        }
    }
}
