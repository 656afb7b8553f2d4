mod auth;
mod code;
mod connection;
mod handler;
mod manager;
mod room;
mod server;
mod slots;

use std::net::SocketAddr;

use clap::Parser;

/// Parlor Server - real-time party-game room server
#[derive(Parser, Debug)]
#[command(name = "parlor-server", version, about)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,

    /// Maximum simultaneous connections allowed
    #[arg(short, long, default_value_t = 100)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor_server=debug,parlor_common=debug".into()),
        )
        .init();

    let args = Args::parse();

    let addr: SocketAddr = args.bind.parse()?;

    tracing::info!(
        "Starting parlor server on {} (max {} connections)",
        addr,
        args.max_connections
    );
    server::run(addr, args.max_connections).await
}
