//! `progress` command-line tool.
//!
//! Reads `progress.toml` (or the path given with `--config`), opens the local
//! JSON store and the remote `SQLite` tables, and runs one synchronizer
//! operation, printing its result as JSON.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use progress_core::model::{Collection, ItemId, ItemType, User, UserId};
use serde::Serialize;
use services::{AppServices, Clock, ItemSyncService};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::{AppConfig, normalize_sqlite_url, prepare_sqlite_file};

#[derive(Parser)]
#[command(author, version, about = "Learned/favorite progress synchronizer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "progress.toml")]
    config: PathBuf,

    /// Act as this user, overriding the configured one.
    #[arg(long, global = true, conflicts_with = "anonymous")]
    user: Option<UserId>,

    /// Ignore any configured user and only touch the local store.
    #[arg(long, global = true)]
    anonymous: bool,

    /// Which flag to operate on.
    #[arg(long, global = true, default_value = "learned")]
    collection: Collection,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List flagged item ids of one type.
    List {
        #[arg(long = "type", default_value = "video")]
        item_type: ItemType,
        /// Only parts of this video.
        #[arg(long)]
        video: Option<ItemId>,
    },
    /// Flip the flag on one item.
    Toggle {
        #[arg(long = "type", default_value = "video")]
        item_type: ItemType,
        #[arg(long)]
        id: ItemId,
        /// Video the sentence or vocabulary item belongs to.
        #[arg(long)]
        video: Option<ItemId>,
        /// The item is flagged right now (toggle it off).
        #[arg(long)]
        currently_set: bool,
    },
    /// Flip the flag on a video and print the local video list.
    ToggleVideo {
        #[arg(long)]
        id: ItemId,
        #[arg(long)]
        currently_set: bool,
    },
    /// Report whether one item is flagged.
    Check {
        #[arg(long = "type", default_value = "video")]
        item_type: ItemType,
        #[arg(long)]
        id: ItemId,
    },
}

#[derive(Serialize)]
struct CheckOutput {
    item_type: ItemType,
    item_id: ItemId,
    set: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    let db_url = normalize_sqlite_url(&cfg.remote_db_url);
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&cfg.local_store_path, &db_url, Clock::system())
        .await
        .with_context(|| format!("failed to open storage ({db_url})"))?;

    let user = if cli.anonymous {
        None
    } else {
        cli.user.or(cfg.user_id).map(User::new)
    };
    tracing::debug!(
        collection = %cli.collection,
        signed_in = user.is_some(),
        "running command"
    );

    let output = run(&services, cli.collection, user.as_ref(), cli.command).await?;
    println!("{output}");
    Ok(())
}

async fn run(
    services: &AppServices,
    collection: Collection,
    user: Option<&User>,
    command: Command,
) -> anyhow::Result<String> {
    let items: &ItemSyncService = services.items(collection);
    let json = match command {
        Command::List { item_type, video } => {
            let loaded = match video {
                Some(video_id) => items.load_items_in_video(user, item_type, video_id).await,
                None => items.load_items(user, item_type).await,
            };
            serde_json::to_string_pretty(&loaded)?
        }
        Command::Toggle {
            item_type,
            id,
            video,
            currently_set,
        } => {
            let report = match video {
                Some(video_id) => {
                    items
                        .toggle_item_in_video(user, item_type, id, video_id, currently_set)
                        .await
                }
                None => items.toggle_item(user, item_type, id, currently_set).await,
            };
            serde_json::to_string_pretty(&report)?
        }
        Command::ToggleVideo { id, currently_set } => {
            let ids = match collection {
                Collection::Learned => {
                    services
                        .progress()
                        .toggle_learned_video(user, id, currently_set)
                        .await
                }
                Collection::Favorites => {
                    services
                        .favorites()
                        .toggle_favorite_video(user, id, currently_set)
                        .await
                }
            };
            serde_json::to_string_pretty(&ids)?
        }
        Command::Check { item_type, id } => serde_json::to_string_pretty(&CheckOutput {
            item_type,
            item_id: id,
            set: items.is_item_set(user, item_type, id).await,
        })?,
    };
    Ok(json)
}
