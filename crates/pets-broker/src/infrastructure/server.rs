//! Broker daemon: accept loop and per-connection frame handling.
//!
//! Each TCP connection gets:
//!
//! - a **reader** (this task) that decodes frames and acts on them,
//! - a **writer** task draining an mpsc channel of outbound frames, and
//! - one **forwarder** task per `Consume` frame, moving deliveries from the
//!   in-memory broker onto the writer channel as `Deliver` frames.
//!
//! Deliveries sent to the client are parked in a map keyed by delivery tag
//! until the client answers with `Ack`, `Reject` or `Requeue`.  When the
//! connection ends, the map is dropped, and every parked delivery is
//! requeued for the next consumer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;

use anyhow::Context;
use pets_core::broker::{Broker, Consumer, Delivery, InMemoryBroker};
use pets_core::protocol::{decode_frame, encode_frame, BrokerFrame, ProtocolError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::READ_CHUNK;
use crate::domain::config::BrokerConfig;

type Parked = Arc<Mutex<HashMap<u64, Delivery>>>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves `broker` until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound.
pub async fn run_server(
    config: BrokerConfig,
    broker: InMemoryBroker,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind broker listener on {}", config.bind_addr))?;
    info!("broker listening on {}", config.bind_addr);
    serve(listener, broker, config.outbound_buffer, running).await;
    Ok(())
}

/// Accepts connections on an already-bound `listener` until `running` is
/// cleared.
pub async fn serve(
    listener: TcpListener,
    broker: InMemoryBroker,
    outbound_buffer: usize,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the loop re-checks `running` while idle.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("client connected from {peer_addr}");
                let broker = broker.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, broker, outbound_buffer).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broker: InMemoryBroker,
    outbound_buffer: usize,
) {
    let (mut read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<BrokerFrame>(outbound_buffer.max(1));
    let writer = tokio::spawn(write_frames(write_half, out_rx, peer_addr));

    let parked: Parked = Arc::new(Mutex::new(HashMap::new()));
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    let mut recv_buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut read_tmp = vec![0u8; READ_CHUNK];

    'conn: loop {
        let n = match read_half.read(&mut read_tmp).await {
            Ok(0) => {
                debug!("{peer_addr}: connection closed (EOF)");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("{peer_addr}: read failed: {e}");
                break;
            }
        };
        recv_buf.extend_from_slice(&read_tmp[..n]);

        loop {
            match decode_frame(&recv_buf) {
                Ok((frame, consumed)) => {
                    recv_buf.drain(..consumed);
                    if let Some(handle) =
                        handle_frame(frame, &broker, &parked, &out_tx, peer_addr).await
                    {
                        forwarders.push(handle);
                    }
                }
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(e) => {
                    warn!("{peer_addr}: decode error, closing connection: {e}");
                    let _ = out_tx
                        .send(BrokerFrame::Error {
                            message: e.to_string(),
                        })
                        .await;
                    break 'conn;
                }
            }
        }
    }

    for handle in &forwarders {
        handle.abort();
    }
    let requeued = {
        let mut parked = parked.lock().unwrap_or_else(PoisonError::into_inner);
        let count = parked.len();
        parked.clear();
        count
    };
    if requeued > 0 {
        info!("{peer_addr}: requeued {requeued} unacknowledged deliveries");
    }
    drop(out_tx);
    let _ = writer.await;
    info!("client {peer_addr} disconnected");
}

/// Acts on one inbound frame.  Returns the forwarder task started by a
/// `Consume` frame.
async fn handle_frame(
    frame: BrokerFrame,
    broker: &InMemoryBroker,
    parked: &Parked,
    out_tx: &mpsc::Sender<BrokerFrame>,
    peer_addr: SocketAddr,
) -> Option<JoinHandle<()>> {
    let refusal = match frame {
        BrokerFrame::Publish(envelope) => broker.publish(envelope).await.err(),
        BrokerFrame::DeclareQueue(spec) => broker.declare_queue(spec).await.err(),
        BrokerFrame::Consume {
            consumer_tag,
            queue,
            prefetch,
        } => match broker.consume(&queue, usize::from(prefetch)).await {
            Ok(consumer) => {
                debug!("{peer_addr}: consumer {consumer_tag} on {queue} (prefetch {prefetch})");
                return Some(tokio::spawn(forward_deliveries(
                    consumer,
                    consumer_tag,
                    Arc::clone(parked),
                    out_tx.clone(),
                )));
            }
            Err(e) => Some(e),
        },
        BrokerFrame::Ack { delivery_tag } => {
            if let Some(delivery) = take_parked(parked, delivery_tag) {
                delivery.ack();
            }
            None
        }
        BrokerFrame::Reject {
            delivery_tag,
            reason,
        } => {
            if let Some(delivery) = take_parked(parked, delivery_tag) {
                delivery.reject(reason);
            }
            None
        }
        BrokerFrame::Requeue { delivery_tag } => {
            if let Some(delivery) = take_parked(parked, delivery_tag) {
                delivery.requeue();
            }
            None
        }
        BrokerFrame::Error { message } => {
            warn!("{peer_addr}: client reported error: {message}");
            None
        }
        BrokerFrame::Deliver { .. } => {
            warn!("{peer_addr}: unexpected Deliver frame from client");
            None
        }
    };

    if let Some(e) = refusal {
        warn!("{peer_addr}: request refused: {e}");
        let _ = out_tx
            .send(BrokerFrame::Error {
                message: e.to_string(),
            })
            .await;
    }
    None
}

fn take_parked(parked: &Parked, delivery_tag: u64) -> Option<Delivery> {
    let delivery = parked
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&delivery_tag);
    if delivery.is_none() {
        debug!(delivery_tag, "settlement for unknown delivery tag ignored");
    }
    delivery
}

async fn forward_deliveries(
    mut consumer: Consumer,
    consumer_tag: u32,
    parked: Parked,
    out_tx: mpsc::Sender<BrokerFrame>,
) {
    while let Some(delivery) = consumer.recv().await {
        let frame = BrokerFrame::Deliver {
            consumer_tag,
            delivery_tag: delivery.tag(),
            envelope: delivery.envelope().clone(),
        };
        parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(delivery.tag(), delivery);
        if out_tx.send(frame).await.is_err() {
            break;
        }
    }
}

async fn write_frames(
    mut write_half: OwnedWriteHalf,
    mut out_rx: mpsc::Receiver<BrokerFrame>,
    peer_addr: SocketAddr,
) {
    while let Some(frame) = out_rx.recv().await {
        let bytes = match encode_frame(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("{peer_addr}: failed to encode frame: {e}");
                continue;
            }
        };
        if let Err(e) = write_half.write_all(&bytes).await {
            warn!("{peer_addr}: write failed: {e}");
            break;
        }
    }
}
