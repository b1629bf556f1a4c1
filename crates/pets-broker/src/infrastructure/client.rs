//! [`Broker`] implementation that talks to the broker daemon over TCP.
//!
//! One `RemoteBroker` owns one TCP connection.  Outbound frames go through an
//! unbounded channel to a writer task, so settling a delivery (which happens
//! in synchronous code, including `Drop`) never has to await.  A reader task
//! decodes inbound `Deliver` frames and routes them to the [`Consumer`] that
//! registered the matching consumer tag.
//!
//! `Publish`, `DeclareQueue` and `Consume` are fire-and-forget: the daemon
//! reports a refusal with an `Error` frame, which is logged.  Frames on one
//! connection are processed in order, so a declare followed by a consume on
//! the same queue is always safe.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use async_trait::async_trait;
use pets_core::broker::{Broker, BrokerError, Consumer, Delivery, Settle, Settlement};
use pets_core::protocol::{decode_frame, encode_frame, BrokerFrame, Envelope, ProtocolError};
use pets_core::topology::QueueSpec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::READ_CHUNK;

struct Registration {
    queue: String,
    tx: mpsc::Sender<Delivery>,
}

type Registry = Arc<Mutex<HashMap<u32, Registration>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<u32, Registration>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sends settlements back to the daemon.
struct RemoteSettler {
    out_tx: mpsc::UnboundedSender<BrokerFrame>,
}

impl Settle for RemoteSettler {
    fn settle(&self, delivery_tag: u64, settlement: Settlement) {
        let frame = match settlement {
            Settlement::Ack => BrokerFrame::Ack { delivery_tag },
            Settlement::Reject(reason) => BrokerFrame::Reject {
                delivery_tag,
                reason,
            },
            Settlement::Requeue => BrokerFrame::Requeue { delivery_tag },
        };
        if self.out_tx.send(frame).is_err() {
            // The daemon requeues everything unacked when the link drops.
            debug!(delivery_tag, "connection closed before settlement was sent");
        }
    }
}

/// A [`Broker`] reached over TCP.
pub struct RemoteBroker {
    peer_addr: SocketAddr,
    out_tx: mpsc::UnboundedSender<BrokerFrame>,
    registry: Registry,
    next_consumer_tag: AtomicU32,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RemoteBroker {
    /// Connects to the daemon at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Io`] if the TCP connection cannot be opened.
    pub async fn connect(addr: SocketAddr) -> Result<Self, BrokerError> {
        let stream = TcpStream::connect(addr).await?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let settler: Arc<dyn Settle> = Arc::new(RemoteSettler {
            out_tx: out_tx.clone(),
        });

        let writer = tokio::spawn(write_frames(write_half, out_rx));
        let reader = tokio::spawn(read_frames(read_half, Arc::clone(&registry), settler));

        info!("connected to broker at {peer_addr}");
        Ok(Self {
            peer_addr,
            out_tx,
            registry,
            next_consumer_tag: AtomicU32::new(1),
            reader,
            writer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// True once the connection to the daemon has been lost.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished() || self.out_tx.is_closed()
    }

    fn send(&self, frame: BrokerFrame) -> Result<(), BrokerError> {
        self.out_tx.send(frame).map_err(|_| BrokerError::Closed)
    }
}

impl Drop for RemoteBroker {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[async_trait]
impl Broker for RemoteBroker {
    async fn declare_queue(&self, spec: QueueSpec) -> Result<(), BrokerError> {
        self.send(BrokerFrame::DeclareQueue(spec))
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        self.send(BrokerFrame::Publish(envelope))
    }

    async fn consume(&self, queue: &str, prefetch: usize) -> Result<Consumer, BrokerError> {
        let prefetch = u16::try_from(prefetch.max(1)).unwrap_or(u16::MAX);
        let consumer_tag = self.next_consumer_tag.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(usize::from(prefetch));
        lock(&self.registry).insert(
            consumer_tag,
            Registration {
                queue: queue.to_string(),
                tx,
            },
        );

        if let Err(e) = self.send(BrokerFrame::Consume {
            consumer_tag,
            queue: queue.to_string(),
            prefetch,
        }) {
            lock(&self.registry).remove(&consumer_tag);
            return Err(e);
        }
        Ok(Consumer::new(queue, rx))
    }
}

// ── Connection tasks ──────────────────────────────────────────────────────────

async fn write_frames(mut write_half: OwnedWriteHalf, mut out_rx: mpsc::UnboundedReceiver<BrokerFrame>) {
    while let Some(frame) = out_rx.recv().await {
        let bytes = match encode_frame(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("dropping frame that could not be encoded: {e}");
                continue;
            }
        };
        if let Err(e) = write_half.write_all(&bytes).await {
            warn!("write to broker failed: {e}");
            break;
        }
    }
}

async fn read_frames(mut read_half: OwnedReadHalf, registry: Registry, settler: Arc<dyn Settle>) {
    let mut recv_buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut read_tmp = vec![0u8; READ_CHUNK];

    'conn: loop {
        let n = match read_half.read(&mut read_tmp).await {
            Ok(0) => {
                warn!("broker closed the connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("read from broker failed: {e}");
                break;
            }
        };
        recv_buf.extend_from_slice(&read_tmp[..n]);

        loop {
            match decode_frame(&recv_buf) {
                Ok((frame, consumed)) => {
                    recv_buf.drain(..consumed);
                    dispatch(frame, &registry, &settler).await;
                }
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(e) => {
                    warn!("undecodable frame from broker: {e}");
                    break 'conn;
                }
            }
        }
    }

    // Closing every consumer channel ends their `recv()` loops.
    lock(&registry).clear();
}

async fn dispatch(frame: BrokerFrame, registry: &Registry, settler: &Arc<dyn Settle>) {
    match frame {
        BrokerFrame::Deliver {
            consumer_tag,
            delivery_tag,
            envelope,
        } => {
            let target = lock(registry)
                .get(&consumer_tag)
                .map(|r| (r.queue.clone(), r.tx.clone()));
            let Some((queue, tx)) = target else {
                debug!(consumer_tag, "delivery for unknown consumer requeued");
                settler.settle(delivery_tag, Settlement::Requeue);
                return;
            };
            let delivery = Delivery::new(delivery_tag, queue, envelope, Arc::clone(settler));
            // A closed consumer drops the delivery, which requeues it.
            if tx.send(delivery).await.is_err() {
                lock(registry).remove(&consumer_tag);
            }
        }
        BrokerFrame::Error { message } => warn!("broker error: {message}"),
        other => warn!("unexpected frame from broker: {:?}", other.frame_type()),
    }
}
