//! Relay chat client demo
//!
//! Run with:
//!   cargo run --example relay_chat -- --action send --author ann
//!   cargo run --example relay_chat -- --action get --amount 10
//!
//! `send` reads one message per line from stdin until a line containing only
//! `\q` (or end of input), then prints how many messages the server stored.
//!
//! `get` prints the last `--amount` messages (newest first; 0 prints the
//! whole history oldest first) and then every new message as it arrives.

use clap::{Parser, ValueEnum};
use relay_rs::client::{LineInput, QUIT_SENTINEL};
use relay_rs::{ClientConfig, RelayClient};
use tokio::io::BufReader;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Subscribe to history and the live feed
    Get,
    /// Send messages typed on stdin
    Send,
}

#[derive(Parser, Debug)]
#[command(name = "relay_chat")]
#[command(about = "Chat client for the relay server")]
struct Args {
    /// Server address (host:port)
    #[arg(long, env = "RELAY_ADDR", default_value = "localhost:50052")]
    addr: String,

    /// What to do
    #[arg(long, value_enum, default_value = "get")]
    action: Action,

    /// Messages to replay before the live feed (0 = all)
    #[arg(long, default_value = "0")]
    amount: u64,

    /// Author label for sent messages (empty = server default)
    #[arg(long, env = "RELAY_AUTHOR", default_value = "")]
    author: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = RelayClient::new(ClientConfig::new(args.addr));

    match args.action {
        Action::Send => {
            eprintln!("Type messages, one per line. {} to finish.", QUIT_SENTINEL);
            let mut input = LineInput::new(BufReader::new(tokio::io::stdin()));
            let count = client.submit_stream(&args.author, &mut input).await?;
            println!("Server stored {} messages", count);
        }
        Action::Get => {
            let mut feed = client.subscribe(args.amount).await?;
            while let Some(msg) = feed.next_message().await? {
                println!("{}\n-----", msg);
            }
            eprintln!("Server closed the feed");
        }
    }

    Ok(())
}
