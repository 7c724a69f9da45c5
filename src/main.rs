#![allow(missing_docs)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use feedback_harvester_lib::application::{FeedbackSession, text_tools};
use feedback_harvester_lib::infrastructure::config::{
    AppConfig, ConfigManager, resolve_export_dir, resolve_progress_dir,
};
use feedback_harvester_lib::infrastructure::{
    ExportEmitter, ProgressPersistence, WildberriesClient, init_logging_with_config,
};
use feedback_harvester_lib::pipeline::{RunOrchestrator, RunStatus};

#[derive(Parser, Debug)]
#[command(
    name = "feedback-harvester",
    version,
    about = "Fetch answered Wildberries feedback and export it as CSV"
)]
struct Cli {
    /// Configuration file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feedback, checkpointing after every group
    Fetch {
        /// Seller API key
        #[arg(long, env = "WB_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Lookback window in days
        #[arg(long)]
        days: Option<u32>,

        /// Comma-separated nmIds; all products when omitted
        #[arg(long, conflicts_with = "ids_file")]
        ids: Option<String>,

        /// File with one nmId per line
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Export the CSV right after a completed run
        #[arg(long, default_value_t = false)]
        export: bool,
    },

    /// Export the last checkpointed CSV and clear the checkpoint
    Export,

    /// Show the last checkpointed progress log
    Status,

    /// Discard the checkpointed progress
    Reset,

    /// Turn a newline-separated list into a comma-separated one
    FormatIds {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Numbers of the first list that also appear in the second
    Intersect { first: String, second: String },

    /// Cut every comma-separated entry at its first dash
    TrimDashes { input: String },

    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let config = manager.load_config().await?;

    init_logging_with_config(&config.logging)?;

    match cli.command {
        Command::Fetch {
            api_key,
            days,
            ids,
            ids_file,
            export,
        } => {
            let identifiers = match ids_file {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    text_tools::format_id_list(&raw)
                }
                None => ids.unwrap_or_default(),
            };
            let lookback_days = days.unwrap_or(config.fetch.default_lookback_days);
            fetch(&config, api_key, lookback_days, identifiers, export).await
        }
        Command::Export => {
            let mut session = mount_session(&config).await?;
            let path = session.save_file().await?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::Status => status(&config).await,
        Command::Reset => {
            progress_store(&config)?.clear().await?;
            println!("Progress cleared");
            Ok(())
        }
        Command::FormatIds { file } => {
            let raw = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("Failed to read stdin")?;
                    buffer
                }
            };
            println!("{}", text_tools::format_id_list(&raw));
            Ok(())
        }
        Command::Intersect { first, second } => {
            let matches = text_tools::compute_matches(&first, &second)?;
            println!("{}", text_tools::join_for_display(&matches));
            Ok(())
        }
        Command::TrimDashes { input } => {
            let trimmed = text_tools::truncate_at_dash(&input)?;
            println!("{}", text_tools::join_for_display(&trimmed));
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("# {}", manager.config_path().display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Reset => {
                manager.reset_to_defaults().await?;
                println!("Configuration reset: {}", manager.config_path().display());
                Ok(())
            }
        },
    }
}

async fn fetch(
    config: &AppConfig,
    api_key: String,
    lookback_days: u32,
    identifiers: String,
    export: bool,
) -> Result<()> {
    let mut session = mount_session(config).await?;
    session.api_key = api_key;
    session.lookback_days = lookback_days;
    session.nmid_list = identifiers;

    let report = session.fetch().await;
    for line in &report.log {
        println!("{line}");
    }
    if let RunStatus::Aborted(reason) = &report.status {
        bail!("Run aborted: {reason}");
    }
    info!(
        "✅ Run {} finished with {} failures",
        report.run_id,
        report.failures.len()
    );

    if export {
        let path = session.save_file().await?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

async fn status(config: &AppConfig) -> Result<()> {
    let Some(progress) = progress_store(config)?.load_last_checkpoint().await? else {
        println!("No checkpointed run");
        return Ok(());
    };

    for line in &progress.log {
        println!("{line}");
    }
    let rows = csv::Reader::from_reader(progress.csv_body.as_bytes())
        .records()
        .count();
    println!("{rows} CSV rows ready to export");
    Ok(())
}

fn progress_store(config: &AppConfig) -> Result<ProgressPersistence> {
    Ok(ProgressPersistence::on_disk(resolve_progress_dir(
        &config.storage,
    )?))
}

async fn mount_session(config: &AppConfig) -> Result<FeedbackSession> {
    let client = WildberriesClient::new(&config.fetch).context("Failed to build HTTP client")?;
    let orchestrator = RunOrchestrator::new(Arc::new(client), progress_store(config)?, &config.fetch);
    let exporter = ExportEmitter::to_directory(resolve_export_dir(&config.export)?);

    let session =
        FeedbackSession::mount(orchestrator, exporter, config.fetch.default_lookback_days).await?;
    Ok(session)
}
