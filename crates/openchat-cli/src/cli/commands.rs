use anyhow::{Context, Result};
use clap::Subcommand;
use openchat_core::protocol::capability::{
    CheckUsername, GetAllCachedUsers, GetBio, GetInitialState, GetUpdates, GetUserStorageLimits,
    GetUsers, MarkAsOnline, PinChat, UnpinChat,
};
use openchat_core::BridgeClient;
use serde::Serialize;
use tokio::sync::broadcast;

/// Commands that run against a ready worker.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the full chat list
    InitialState,

    /// Load the chat list, then apply one round of updates to it
    Updates,

    /// Look up users by id
    Users {
        user_ids: Vec<String>,
        /// Answer from the local cache where possible
        #[arg(long)]
        allow_stale: bool,
    },

    /// Dump the local user cache
    CachedUsers,

    /// Check whether a username is available
    CheckUsername { username: String },

    /// Show a user's bio (your own when no id is given)
    Bio { user_id: Option<String> },

    /// Pin a chat
    Pin { chat_id: String },

    /// Unpin a chat
    Unpin { chat_id: String },

    /// Show storage usage
    Storage,

    /// Mark the current user as online
    Online,

    /// Print worker events until Ctrl-C
    Watch,
}

pub async fn run_command(command: Command, client: &BridgeClient, pretty: bool) -> Result<()> {
    match command {
        Command::InitialState => print_json(&client.invoke(GetInitialState).await?, pretty),
        Command::Updates => {
            let initial = client.invoke(GetInitialState).await?;
            let merged = client
                .invoke(GetUpdates {
                    current_state: initial.state,
                })
                .await?;
            print_json(&merged, pretty)
        }
        Command::Users {
            user_ids,
            allow_stale,
        } => {
            let users = client
                .invoke(GetUsers {
                    user_ids,
                    allow_stale,
                })
                .await?;
            print_json(&users, pretty)
        }
        Command::CachedUsers => print_json(&client.invoke(GetAllCachedUsers).await?, pretty),
        Command::CheckUsername { username } => {
            print_json(&client.invoke(CheckUsername { username }).await?, pretty)
        }
        Command::Bio { user_id } => print_json(&client.invoke(GetBio { user_id }).await?, pretty),
        Command::Pin { chat_id } => print_json(&client.invoke(PinChat { chat_id }).await?, pretty),
        Command::Unpin { chat_id } => {
            print_json(&client.invoke(UnpinChat { chat_id }).await?, pretty)
        }
        Command::Storage => {
            let status = client.invoke(GetUserStorageLimits).await?;
            print_json(
                &serde_json::json!({
                    "byteLimit": status.byte_limit,
                    "bytesUsed": status.bytes_used,
                    "percentUsed": status.percent_used(),
                }),
                pretty,
            )
        }
        Command::Online => {
            client.invoke(MarkAsOnline).await?;
            print_json(&serde_json::json!({ "online": true }), pretty)
        }
        Command::Watch => watch(client, pretty).await,
    }
}

async fn watch(client: &BridgeClient, pretty: bool) -> Result<()> {
    let mut events = client.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_json(&event, pretty)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", output);
    Ok(())
}
