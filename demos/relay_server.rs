//! Relay server demo
//!
//! Run with: cargo run --example relay_server -- [--addr 127.0.0.1:50052] [--log-file messages.jsonl]
//!
//! Settings are read from the environment (and a `.env` file) first:
//!   RELAY_BIND_ADDR, RELAY_MAX_CONNECTIONS, RELAY_DEFAULT_AUTHOR, RELAY_LOG_FILE
//! Command line flags override them.
//!
//! Without `--log-file` messages are kept in memory and lost on exit. With
//! the `postgres` feature, `--database-url` stores them in PostgreSQL.
//!
//! Stop with Ctrl+C; readers are disconnected and writers finish the message
//! they are on.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use relay_rs::{FileLog, MemoryLog, MessageLog, RelayServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "relay_server")]
#[command(about = "Durable message relay server")]
struct Args {
    /// Address to listen on
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// JSON-lines file to persist messages in
    #[arg(long, env = "RELAY_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// PostgreSQL connection string
    #[cfg(feature = "postgres")]
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Table used with --database-url
    #[cfg(feature = "postgres")]
    #[arg(long, default_value = "messages")]
    table: String,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long)]
    max_connections: Option<usize>,

    /// Per-subscriber buffer before a slow reader is dropped
    #[arg(long, default_value = "256")]
    channel_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env()?.shutdown_timeout(Duration::from_secs(5));
    if let Some(addr) = args.addr {
        config = config.bind(addr);
    }
    if let Some(max) = args.max_connections {
        config = config.max_connections(max);
    }

    let registry_config = relay_rs::RegistryConfig::default().channel_capacity(args.channel_capacity);

    #[cfg(feature = "postgres")]
    if let Some(url) = args.database_url.as_deref() {
        let log = relay_rs::PgLog::connect(url, &args.table).await?;
        return serve(config, log, registry_config).await;
    }

    match args.log_file {
        Some(path) => {
            let log = FileLog::open(&path).await?;
            println!("Persisting messages to {}", log.path().display());
            serve(config, log, registry_config).await
        }
        None => {
            tracing::warn!("No --log-file given, messages are kept in memory only");
            serve(config, MemoryLog::new(), registry_config).await
        }
    }
}

async fn serve<L: MessageLog>(
    config: ServerConfig,
    log: L,
    registry_config: relay_rs::RegistryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = RelayServer::with_registry_config(config, log, registry_config);

    println!("Relay server listening on {}", server.bind_addr());
    match server.config().max_connections {
        0 => println!("Connections: unlimited"),
        max => println!("Connections: up to {}", max),
    }
    println!("Press Ctrl+C to stop");
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = server.registry().stats();
    println!(
        "Stats: subscribers={} broadcasts={} deliveries={} evictions={}",
        stats.total_registered, stats.broadcasts, stats.deliveries, stats.evictions
    );
    Ok(())
}
