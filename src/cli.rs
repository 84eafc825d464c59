use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::Result;
use crate::models::OutcomeStatus;
use crate::service::PublisherService;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "drive-publisher",
    version,
    about = "Publish videos from Google Drive folders to YouTube, one per channel per run"
)]
pub struct Cli {
    /// JSON config file
    #[arg(
        short,
        long,
        global = true,
        env = "DRIVE_PUBLISHER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: String,

    /// Skip the remote store and use local files only
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish the next video of one channel, or of every enabled channel
    Upload {
        #[arg(long)]
        channel: Option<String>,
        /// Publish this Drive file instead of the next one in rotation
        #[arg(long, requires = "channel", conflicts_with = "dry_run")]
        item: Option<String>,
        /// Show what would be published without uploading or moving the rotation
        #[arg(long)]
        dry_run: bool,
    },
    /// Select the next video, advancing the rotation
    Next {
        #[arg(long)]
        channel: String,
    },
    /// Count published and pending videos
    Stats {
        #[arg(long)]
        channel: String,
    },
    /// List videos with their publish status
    Videos {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show past publishes, newest first
    History {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// List configured channels
    Channels,
    /// Inspect or move the subfolder rotation cursor
    Rotation {
        #[command(subcommand)]
        action: RotationCommand,
    },
    /// Forget published records so videos become eligible again
    Clear {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        channel: Option<String>,
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RotationCommand {
    Get {
        #[arg(long)]
        channel: String,
    },
    Set {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        index: usize,
        #[arg(long)]
        folder_id: String,
        #[arg(long)]
        folder_name: String,
    },
}

/// JSON printed to stdout and whether the process should exit cleanly.
#[derive(Debug)]
pub struct CommandOutput {
    pub json: Value,
    pub ok: bool,
}

impl CommandOutput {
    fn ok(json: Value) -> Self {
        Self { json, ok: true }
    }
}

/// Exhausted channels are not errors; failures and config problems are.
fn outcome_ok(status: OutcomeStatus) -> bool {
    matches!(status, OutcomeStatus::Published | OutcomeStatus::Exhausted)
}

pub async fn execute(service: Arc<PublisherService>, command: Commands) -> Result<CommandOutput> {
    let output = match command {
        Commands::Upload {
            channel: Some(channel),
            item: Some(item),
            ..
        } => {
            let outcome = service.publish_item_by_id(&channel, &item).await;
            CommandOutput {
                ok: outcome.success,
                json: serde_json::to_value(outcome)?,
            }
        }
        Commands::Upload {
            channel: Some(channel),
            dry_run: true,
            ..
        } => CommandOutput::ok(serde_json::to_value(service.dry_run(&channel).await?)?),
        Commands::Upload {
            channel: None,
            dry_run: true,
            ..
        } => {
            let mut reports = Vec::new();
            for channel in service.channels().await?.into_iter().filter(|c| c.enabled) {
                reports.push(service.dry_run(&channel.id).await?);
            }
            CommandOutput::ok(serde_json::to_value(reports)?)
        }
        Commands::Upload {
            channel: Some(channel),
            dry_run: false,
            ..
        } => {
            let outcome = service.publish_channel(&channel).await;
            CommandOutput {
                ok: outcome_ok(outcome.status),
                json: serde_json::to_value(outcome)?,
            }
        }
        Commands::Upload {
            channel: None,
            dry_run: false,
            ..
        } => {
            let outcomes = service.publish_all().await;
            CommandOutput {
                ok: outcomes.iter().all(|outcome| outcome_ok(outcome.status)),
                json: serde_json::to_value(outcomes)?,
            }
        }
        Commands::Next { channel } => {
            CommandOutput::ok(serde_json::to_value(service.get_next_publish(&channel).await?)?)
        }
        Commands::Stats { channel } => {
            CommandOutput::ok(serde_json::to_value(service.channel_stats(&channel).await?)?)
        }
        Commands::Videos { channel, limit } => {
            CommandOutput::ok(serde_json::to_value(service.list_videos(&channel, limit).await?)?)
        }
        Commands::History { channel, limit } => {
            let history = service.history(channel.as_deref(), limit).await?;
            CommandOutput::ok(serde_json::to_value(history)?)
        }
        Commands::Channels => CommandOutput::ok(serde_json::to_value(service.channels().await?)?),
        Commands::Rotation {
            action: RotationCommand::Get { channel },
        } => CommandOutput::ok(serde_json::to_value(service.get_rotation_state(&channel).await)?),
        Commands::Rotation {
            action:
                RotationCommand::Set {
                    channel,
                    index,
                    folder_id,
                    folder_name,
                },
        } => {
            let report = service
                .set_rotation_state(&channel, index, &folder_id, &folder_name)
                .await?;
            CommandOutput {
                ok: report.local || report.remote,
                json: serde_json::to_value(report)?,
            }
        }
        Commands::Clear { channel, all } => {
            let deleted = match channel {
                Some(channel) if !all => service.clear_channel(&channel).await?,
                _ => service.clear_all().await?,
            };
            CommandOutput::ok(json!({ "deleted": deleted }))
        }
    };
    Ok(output)
}
