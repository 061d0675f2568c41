//! Watch room and sale changes for one accommodation
//!
//! ```text
//! cargo run --example watch_rooms -- --url wss://events.example.com/ws \
//!     --token "$EAGLE_TOKEN" --accom-id accom-1
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use event_listener::logging::{init_logging, LoggingMode};
use event_listener::prelude::*;

/// Print EagleApi document changes as they happen
#[derive(Parser, Debug)]
#[command(name = "watch_rooms")]
#[command(about = "Stream EagleApi document changes to stdout")]
struct Args {
    /// Event socket URL (ws:// or wss://)
    #[arg(long)]
    url: String,

    /// Bearer token
    #[arg(long, env = "EAGLE_TOKEN")]
    token: String,

    /// Accommodation to subscribe to
    #[arg(long)]
    accom_id: String,

    /// Snapshot flags to request
    #[arg(long = "flag", default_values_t = [
        SnapshotFlag::ALL_ROOMS.to_string(),
        SnapshotFlag::ACTIVATED_ROOM_SALES.to_string(),
    ])]
    flags: Vec<String>,

    /// Send PING commands to detect dead connections
    #[arg(long)]
    ping: bool,

    /// Seconds to wait for the initial snapshots
    #[arg(long, default_value = "30")]
    init_timeout: u64,

    /// Verbose diagnostics
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mode = if args.debug {
        LoggingMode::Debug
    } else {
        LoggingMode::Development
    };
    init_logging(mode).context("Failed to initialize logging")?;

    let auth = Arc::new(StaticAuth::new(args.url.clone(), args.token.clone()));
    let listener = EventListener::builder(auth)
        .config(ListenerConfig::responsive())
        .build()
        .context("Failed to build listener")?;

    listener.on_state_changed(|state| {
        if state.is_error {
            eprintln!("error: {}", state.error_message.as_deref().unwrap_or("unknown"));
        } else {
            println!(
                "listening={} connected={} attempts={}",
                state.is_listening, state.is_connected, state.reconnect_attempts
            );
        }
    });

    listener.on_document_changed(|change| match change.change_type {
        ChangeType::Update => println!(
            "{} {}:{} [{}]",
            change.change_type,
            change.collection_name,
            change.id,
            change.changed_fields.join(", ")
        ),
        _ => println!("{} {}:{}", change.change_type, change.collection_name, change.id),
    });

    let options = ListenOptions::new(args.accom_id.clone(), args.flags.clone())
        .ignore_own_changes(true)
        .enable_ping_pong(args.ping);
    listener.listen(options).context("Failed to start listening")?;

    match listener
        .wait_for_initialized_within(Duration::from_secs(args.init_timeout))
        .await
    {
        Ok(true) => println!("initial snapshots received"),
        Ok(false) => println!("still waiting for initial snapshots"),
        Err(e) => return Err(e).context("Listener stopped before initializing"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    if !listener.stop().await {
        eprintln!("listener did not stop cleanly");
    }
    listener.dispose();

    Ok(())
}
