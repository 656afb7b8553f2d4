mod app;
mod network;
mod timesync;

use clap::Parser;

/// Parlor Client - headless client for the parlor room server
#[derive(Parser, Debug)]
#[command(name = "parlor-client", version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:3001")]
    server: String,

    /// Nickname to play under
    #[arg(short, long)]
    nickname: String,

    /// Avatar identifier
    #[arg(short, long)]
    avatar: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor_client=info".into()),
        )
        .init();

    let args = Args::parse();
    app::run(&args.server, &args.nickname, args.avatar).await
}
