use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use parlor_auth::JwtManager;
use parlor_config::load as load_config;
use parlor_gateway::{create_router, GatewayState};
use parlor_runtime::{telemetry, BackendServices};

#[derive(Parser)]
#[command(name = "parlor-server")]
#[command(about = "Parlor real-time chat relay (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Print a signed bearer token for a development client
    IssueToken {
        /// Sender identity to embed in the token
        #[arg(long)]
        subject: String,
    },
    /// Print the stored history of a room
    History {
        #[arg(long)]
        room: String,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::IssueToken { subject } => issue_token(&subject),
        Commands::History { room, limit } => dump_history(&room, limit).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Parlor relay");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(
        services.stream_handler(),
        services.jwt.clone(),
        config.history.clone(),
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(parlor_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("relay shut down");
    Ok(())
}

fn issue_token(subject: &str) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let token = JwtManager::from_config(&config.auth)
        .issue_token(subject)
        .context("failed to issue token")?;

    println!("{token}");
    Ok(())
}

async fn dump_history(room: &str, limit: Option<u32>) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let limit = config.history.clamp(limit);
    let messages = services
        .store
        .list_by_room(room, limit)
        .await
        .with_context(|| format!("failed to read history for room {room}"))?;

    println!("=== ROOM {room} ===");
    if messages.is_empty() {
        println!("No messages found");
    } else {
        println!("{:<38} {:<20} {:<32} Content", "ID", "Sender", "Created At");
        println!("{}", "-".repeat(110));
        for message in messages {
            println!(
                "{:<38} {:<20} {:<32} {}",
                message.id,
                message.sender_id,
                message.created_at.to_rfc3339(),
                message.content
            );
        }
    }

    Ok(())
}
