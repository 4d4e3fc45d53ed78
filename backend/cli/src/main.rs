mod config;

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chatrelay_gateway::{start_server, GatewayConfig, GatewayState, PresenceRegistry};
use chatrelay_logging::init_logger;

use config::Config;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Real-time presence and message relay for the chat app")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Show the running relay's health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_logger(&config.log_settings());

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                bind_address: bind.unwrap_or(config.bind_address),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status => {
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{}/api/health", config.port))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("chatrelay is not running on port {}", config.port);
                }
            }
        }
    }

    Ok(())
}

/// Accepts bare IPv4 or IPv6 addresses, e.g. `0.0.0.0` or `::`.
fn bind_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind_address
        .trim()
        .parse()
        .with_context(|| format!("invalid bind address {bind_address}"))?;
    Ok(SocketAddr::new(ip, port))
}

async fn run_server(config: Config) -> Result<()> {
    let addr = bind_addr(&config.bind_address, config.port)?;

    info!(
        %addr,
        frontend = %config.frontend_url,
        max_message_bytes = config.max_message_bytes,
        "Starting chatrelay"
    );

    let state = GatewayState::new(PresenceRegistry::new())
        .with_max_message_bytes(config.max_message_bytes);

    start_server(
        GatewayConfig {
            addr,
            frontend_url: config.frontend_url,
        },
        state,
    )
    .await
}
