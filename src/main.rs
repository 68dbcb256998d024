mod gateway;
mod pairing;
mod server;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use waylink_commands::{CommandContext, CommandRegistry};
use waylink_core::config;
use waylink_transport::{FsSessionStore, WhatsAppTransport};

use crate::pairing::{Broadcaster, Coordinator};

#[derive(Parser)]
#[command(
    name = "waylink",
    version,
    about = "Waylink — WhatsApp chat bot with browser-based pairing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and the pairing web server.
    Start,
    /// Print the resolved configuration and session status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => start(&cli.config).await,
        Commands::Status => status(&cli.config),
    }
}

async fn start(config_path: &str) -> anyhow::Result<()> {
    let cfg = config::load(config_path)?;

    let data_dir = config::shellexpand(&cfg.bot.data_dir);
    let session_dir = format!("{data_dir}/whatsapp_session");

    let (transport, msg_rx) = WhatsAppTransport::new(&session_dir, cfg.bot.name.to_uppercase());
    let transport = Arc::new(transport);
    let store = Arc::new(FsSessionStore::new(&session_dir));
    let broadcaster = Arc::new(Broadcaster::new());

    let coordinator = Coordinator::new(
        transport.clone(),
        store,
        broadcaster.clone(),
        Duration::from_secs(cfg.pairing.reconnect_delay_secs),
    );

    println!("Waylink — starting bot \"{}\"...", cfg.bot.name);

    // Pairing web server.
    let server_handle = tokio::spawn(server::serve(cfg.server.clone(), coordinator.clone()));

    // Chat dispatch loop.
    let registry = CommandRegistry::with_defaults();
    let context = CommandContext::new(
        transport.clone(),
        cfg.commands.clone(),
        cfg.bot.name.clone(),
    );
    let gw = gateway::Gateway::new(transport.clone(), registry, context, cfg.behavior.clone());
    let gateway_handle = tokio::spawn(gw.run(msg_rx));

    // Owner announcement, and the liveness heartbeat when enabled.
    tokio::spawn(gateway::announce_session(
        coordinator.clone(),
        transport.clone(),
        cfg.bot.clone(),
        gateway::ANNOUNCE_DELAY,
    ));
    if cfg.heartbeat.enabled {
        tokio::spawn(gateway::heartbeat_loop(
            coordinator.clone(),
            Duration::from_secs(cfg.heartbeat.interval_secs),
        ));
    }

    info!(
        "waylink running | pairing page: http://{}:{}",
        cfg.server.host, cfg.server.port
    );

    // A dead core task is fatal: tell every attached browser before exiting.
    let failure = tokio::select! {
        _ = server_handle => "web server task ended unexpectedly",
        _ = gateway_handle => "gateway task ended unexpectedly",
    };
    error!("{failure}");
    pairing::broadcast_fatal(
        &broadcaster,
        &waylink_core::error::WaylinkError::Transport(failure.to_string()),
    );
    anyhow::bail!(failure)
}

fn status(config_path: &str) -> anyhow::Result<()> {
    let cfg = config::load(config_path)?;
    let data_dir = config::shellexpand(&cfg.bot.data_dir);
    let session_dir = format!("{data_dir}/whatsapp_session");

    println!("Waylink — Status\n");
    println!("Config: {config_path}");
    println!("Bot name: {}", cfg.bot.name);
    println!("Data dir: {data_dir}");
    println!("Pairing page: http://{}:{}", cfg.server.host, cfg.server.port);
    println!(
        "Session: {}",
        if std::path::Path::new(&session_dir).join("linked.json").exists() {
            "linked"
        } else {
            "not linked"
        }
    );
    println!(
        "Owner announcements: {}",
        if cfg.bot.owner_number.is_empty() {
            "disabled (no owner_number)"
        } else {
            "enabled"
        }
    );
    println!(
        "Photo enhancement: {}",
        if cfg.commands.cloudinary_url.is_empty() {
            "not configured"
        } else {
            "configured"
        }
    );
    Ok(())
}
