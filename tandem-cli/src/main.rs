use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::net::SocketAddr;
use tandem_client::config::DEFAULT_SERVER_URL;
use tandem_client::{CallHandle, ClientConfig, MediaConstraints};
use tandem_core::{ConnectionStatus, IceServerConfig, RoomId, UserId};
use tandem_server::{DEFAULT_BIND_ADDR, ServerConfig};
use tracing_subscriber::EnvFilter;

const ROOM_CODE_LEN: usize = 6;

#[derive(Parser)]
#[command(name = "tandem", version, about = "One-to-one video call signaling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling server
    Serve {
        #[arg(long, env = "TANDEM_BIND", default_value = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,
    },
    /// Join a room and follow the call until it ends or Ctrl-C
    Call {
        #[arg(long, env = "TANDEM_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
        server: String,

        /// Room code; prompted for when missing
        #[arg(short, long)]
        room: Option<String>,

        /// Defaults to a generated `user_<millis>_<suffix>` id
        #[arg(long)]
        user_id: Option<String>,

        /// Comma separated STUN urls replacing the public defaults
        #[arg(long, env = "TANDEM_STUN", value_delimiter = ',')]
        stun: Vec<String>,

        #[arg(long)]
        no_video: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { bind } => {
            println!("{}", format!("Starting signaling server on {}", bind).green().bold());
            tandem_server::serve(ServerConfig { bind_addr: bind }).await?;
        }
        Commands::Call {
            server,
            room,
            user_id,
            stun,
            no_video,
        } => {
            let room_id = match room {
                Some(room) => RoomId::parse(&room)?,
                None => prompt_room()?,
            };
            let user_id = match user_id {
                Some(id) => UserId::parse(&id)?,
                None => UserId::generate(),
            };

            let ice_servers = if stun.is_empty() {
                IceServerConfig::defaults()
            } else {
                stun.into_iter().map(IceServerConfig::stun).collect()
            };
            let config = ClientConfig {
                server_url: server,
                ice_servers,
                media: MediaConstraints {
                    audio: true,
                    video: !no_video,
                },
                ..Default::default()
            };

            run_call(config, user_id, room_id).await?;
        }
    }

    Ok(())
}

fn prompt_room() -> Result<RoomId> {
    let code = Input::<String>::new()
        .with_prompt("Room code")
        .default(RoomId::generate(ROOM_CODE_LEN).to_string())
        .interact_text()
        .context("Failed to read the room code")?;
    Ok(RoomId::parse(code.trim())?)
}

fn print_status(status: ConnectionStatus) {
    let line = format!("● {}", status.label());
    let line = match status {
        ConnectionStatus::Connected => line.green().bold(),
        ConnectionStatus::Failed => line.red().bold(),
        ConnectionStatus::Closed | ConnectionStatus::DisconnectedPeerLeft => line.yellow(),
        _ => line.cyan(),
    };
    println!("{}", line);
}

async fn run_call(config: ClientConfig, user_id: UserId, room_id: RoomId) -> Result<()> {
    println!("{} {}", "User:".bold(), user_id);
    println!("{} {}", "Room:".bold(), room_id);

    let handle = CallHandle::with_defaults(config, user_id);
    let mut status = handle.subscribe();

    handle
        .start_call(room_id)
        .await
        .context("Failed to start the call")?;

    loop {
        let current = *status.borrow_and_update();
        print_status(current);
        if current.is_terminal() {
            break;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Hanging up...".cyan());
                handle.hang_up().await;
            }
        }
    }

    Ok(())
}
