//! pets-cat-service: entry point.
//!
//! # Usage
//!
//! ```text
//! pets-cat-service [CONFIG.toml]
//! ```
//!
//! The config path may also be given in `PETS_CONFIG`.  Without one, the
//! defaults from `pets_core::config` are used (broker at `127.0.0.1:5679`).
//!
//! # What happens at startup
//!
//! 1. Configuration is loaded and logging initialised (`RUST_LOG` wins over
//!    `service.log_level`).
//! 2. A `RemoteBroker` connection to the broker daemon is opened.
//! 3. The cat service is wired: in-memory store, RPC owner directory.
//! 4. An `RpcListener` serves every `cat.*` queue until Ctrl+C.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use pets_broker::RemoteBroker;
use pets_cat_service::{CatMessageListener, CatService, InMemoryCatRepository, RpcOwnerDirectory};
use pets_core::config::{config_path_from, load_config, CONFIG_ENV};
use pets_core::{Broker, Operation, RpcClient, RpcListener};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path_from(std::env::var(CONFIG_ENV).ok(), std::env::args().skip(1));
    let config = load_config(path.as_deref(), "cat-service").context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let broker_addr: SocketAddr = config
        .broker
        .address
        .parse()
        .with_context(|| format!("invalid broker address '{}'", config.broker.address))?;
    let broker: Arc<dyn Broker> = Arc::new(
        RemoteBroker::connect(broker_addr)
            .await
            .with_context(|| format!("failed to connect to broker at {broker_addr}"))?,
    );

    let rpc = Arc::new(RpcClient::new(Arc::clone(&broker), config.rpc_config()));
    let owners = Arc::new(RpcOwnerDirectory::new(rpc));
    let service = Arc::new(CatService::new(InMemoryCatRepository::new(), owners));
    let handler = Arc::new(CatMessageListener::new(service));

    let listener = RpcListener::new(broker, handler, config.listener.concurrency);
    let running = listener.running_flag();
    spawn_ctrl_c_handler(Arc::clone(&running));

    info!(
        "{} serving {} operations via {broker_addr}",
        config.service.name,
        Operation::CAT.len()
    );
    listener
        .run(&Operation::CAT)
        .await
        .context("cat listener failed")?;
    info!("cat service stopped");
    Ok(())
}

fn spawn_ctrl_c_handler(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received; shutting down");
            running.store(false, Ordering::Relaxed);
        }
    });
}
