//! pets-broker daemon: entry point.
//!
//! # Usage
//!
//! ```text
//! pets-broker [OPTIONS]
//!
//! Options:
//!   --bind <ADDR>             Listen address [default: 127.0.0.1:5679]
//!   --outbound-buffer <N>     Frames buffered per connection [default: 256]
//! ```
//!
//! | Variable           | Default          |
//! |--------------------|------------------|
//! | `PETS_BROKER_BIND` | `127.0.0.1:5679` |
//! | `RUST_LOG`         | `info`           |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use clap::Parser;
use pets_broker::domain::config::DEFAULT_BIND_ADDR;
use pets_broker::{run_server, BrokerConfig};
use pets_core::broker::InMemoryBroker;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Message broker for the pets services.
#[derive(Debug, Parser)]
#[command(name = "pets-broker", version)]
struct Cli {
    /// Address to accept service connections on.
    #[arg(long, default_value = DEFAULT_BIND_ADDR, env = "PETS_BROKER_BIND")]
    bind: SocketAddr,

    /// Outbound frames buffered per connection.
    #[arg(long, default_value_t = 256)]
    outbound_buffer: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BrokerConfig {
        bind_addr: cli.bind,
        outbound_buffer: cli.outbound_buffer,
    };

    // The standard topology is declared up front; services only add their
    // namespaced reply queues.
    let broker = InMemoryBroker::standard();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received; shutting down");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    run_server(config, broker, running).await
}
