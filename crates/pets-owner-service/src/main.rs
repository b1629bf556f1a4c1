//! pets-owner-service: entry point.
//!
//! ```text
//! pets-owner-service [CONFIG.toml]
//! ```
//!
//! Same startup sequence as the cat service: configuration (path argument
//! or `PETS_CONFIG`), logging, a `RemoteBroker` connection, then an
//! `RpcListener` serving every `owner.*` queue until Ctrl+C.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use pets_broker::RemoteBroker;
use pets_core::config::{config_path_from, load_config, CONFIG_ENV};
use pets_core::{Broker, Operation, RpcClient, RpcListener};
use pets_owner_service::{
    InMemoryOwnerRepository, OwnerMessageListener, OwnerService, RpcCatDirectory,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path_from(std::env::var(CONFIG_ENV).ok(), std::env::args().skip(1));
    let config =
        load_config(path.as_deref(), "owner-service").context("failed to load configuration")?;

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
    let cats = Arc::new(RpcCatDirectory::new(rpc));
    let service = Arc::new(OwnerService::new(InMemoryOwnerRepository::new(), cats));
    let handler = Arc::new(OwnerMessageListener::new(service));

    let listener = RpcListener::new(broker, handler, config.listener.concurrency);
    let running = listener.running_flag();
    spawn_ctrl_c_handler(Arc::clone(&running));

    info!(
        "{} serving {} operations via {broker_addr} (rpc timeout {} ms)",
        config.service.name,
        Operation::OWNER.len(),
        config.rpc.timeout_ms
    );
    listener
        .run(&Operation::OWNER)
        .await
        .context("owner listener failed")?;
    info!("owner service stopped");
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
