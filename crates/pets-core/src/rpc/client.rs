//! Caller side of the RPC protocol.
//!
//! # How a call works (for beginners)
//!
//! ```text
//! call()                                  reply dispatcher task
//!   │ register corr id in `pending`             │
//!   │ publish request ─────► broker ──► callee   │
//!   │ wait on oneshot (with deadline)            │
//!   │                       reply queue ───────► │ look up corr id
//!   │ ◄──────────────────── oneshot send ─────── │
//! ```
//!
//! Each reply queue has exactly one dispatcher task per client.  Waiting
//! callers are registered in a map keyed by correlation id; the dispatcher
//! removes the entry and hands the body over.  A reply whose id is not in
//! the map (the caller already timed out, or it was never ours) is logged
//! and discarded.
//!
//! When a call ends, for any reason, its entry is removed from the map by a
//! drop guard, so no state outlives the call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::RpcConfig;
use crate::broker::{Broker, BrokerError, Consumer};
use crate::domain::error::DomainError;
use crate::protocol::envelope::{CorrelationId, Envelope};
use crate::protocol::payload::PayloadError;
use crate::topology::{Operation, QueueSpec};

/// How many replies a dispatcher may hold unsettled.
const REPLY_PREFETCH: usize = 64;

/// Errors returned by [`RpcClient::call`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// No matching reply arrived within the deadline.
    #[error("no reply to '{routing_key}' within {timeout:?}")]
    Timeout {
        routing_key: String,
        timeout: Duration,
    },

    /// The request could not be published or the reply queue consumed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A request or reply body could not be (de)serialised.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The reply dispatcher stopped before the call completed.
    #[error("reply channel closed")]
    Closed,
}

impl From<RpcError> for DomainError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout {
                routing_key,
                timeout,
            } => DomainError::Timeout {
                operation: routing_key,
                timeout_ms: timeout.as_millis() as u64,
            },
            other => DomainError::Unavailable(other.to_string()),
        }
    }
}

type Waiters = Mutex<HashMap<CorrelationId, oneshot::Sender<Vec<u8>>>>;

fn lock(waiters: &Waiters) -> MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Vec<u8>>>> {
    waiters.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a waiter from the registry when its call ends.
struct PendingGuard<'a> {
    waiters: &'a Waiters,
    correlation_id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.waiters).remove(&self.correlation_id);
    }
}

/// Synchronous-looking RPC over a [`Broker`].
pub struct RpcClient {
    broker: Arc<dyn Broker>,
    config: RpcConfig,
    waiters: Arc<Waiters>,
    dispatchers: tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RpcClient {
    pub fn new(broker: Arc<dyn Broker>, config: RpcConfig) -> Self {
        Self {
            broker,
            config,
            waiters: Arc::new(Mutex::new(HashMap::new())),
            dispatchers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Number of calls currently waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        lock(&self.waiters).len()
    }

    /// Reply queue this client uses for `op`, including its namespace.
    pub fn reply_queue_for(&self, op: Operation) -> String {
        match &self.config.reply_namespace {
            Some(ns) => format!("{}.{ns}", op.reply_queue()),
            None => op.reply_queue(),
        }
    }

    /// Calls `op` with `body` and waits for the reply body.
    ///
    /// # Errors
    ///
    /// [`RpcError::Timeout`] when no reply arrives in time, or a broker error
    /// when the request cannot be sent.
    pub async fn call_op(&self, op: Operation, body: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let reply_queue = self.reply_queue_for(op);
        self.call(op.exchange(), op.routing_key(), body, &reply_queue)
            .await
    }

    /// Publishes `body` to `exchange`/`routing_key` and waits for a reply on
    /// `reply_queue` carrying the same correlation id.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::call_op`].
    pub async fn call(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        reply_queue: &str,
    ) -> Result<Vec<u8>, RpcError> {
        self.ensure_dispatcher(reply_queue).await?;

        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        lock(&self.waiters).insert(correlation_id, tx);
        let _guard = PendingGuard {
            waiters: &self.waiters,
            correlation_id,
        };

        debug!(%correlation_id, routing_key, reply_queue, "sending request");
        let request = Envelope::request(exchange, routing_key, correlation_id, reply_queue, body);
        self.broker.publish(request).await?;

        match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                warn!(%correlation_id, routing_key, timeout = ?self.config.timeout, "rpc timed out");
                Err(RpcError::Timeout {
                    routing_key: routing_key.to_string(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    /// Declares `reply_queue` and starts its dispatcher on first use.
    async fn ensure_dispatcher(&self, reply_queue: &str) -> Result<(), RpcError> {
        let mut dispatchers = self.dispatchers.lock().await;
        if let Some(handle) = dispatchers.get(reply_queue) {
            if !handle.is_finished() {
                return Ok(());
            }
        }

        self.broker
            .declare_queue(QueueSpec::durable(reply_queue))
            .await?;
        let consumer = self.broker.consume(reply_queue, REPLY_PREFETCH).await?;
        let handle = tokio::spawn(dispatch_replies(consumer, self.waiters.clone()));
        dispatchers.insert(reply_queue.to_string(), handle);
        Ok(())
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        for handle in self.dispatchers.get_mut().values() {
            handle.abort();
        }
    }
}

/// Hands every reply on one queue to the caller waiting for its
/// correlation id.
async fn dispatch_replies(mut consumer: Consumer, waiters: Arc<Waiters>) {
    while let Some(delivery) = consumer.recv().await {
        let envelope = delivery.envelope();
        let waiter = envelope
            .correlation_id
            .and_then(|id| lock(&waiters).remove(&id));

        match waiter {
            Some(tx) => {
                // The caller may have given up between remove and send.
                let _ = tx.send(envelope.body.clone());
            }
            None => warn!(
                queue = consumer.queue(),
                correlation_id = ?envelope.correlation_id,
                "discarding reply with no waiting caller"
            ),
        }
        delivery.ack();
    }
    debug!(queue = consumer.queue(), "reply dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;

    fn client(broker: &InMemoryBroker, timeout_ms: u64) -> RpcClient {
        RpcClient::new(
            Arc::new(broker.clone()),
            RpcConfig::default().with_timeout(Duration::from_millis(timeout_ms)),
        )
    }

    #[test]
    fn test_reply_queue_namespace_is_appended() {
        let broker = InMemoryBroker::standard();
        let plain = client(&broker, 10);
        let named = RpcClient::new(
            Arc::new(broker),
            RpcConfig::default().with_namespace("owner-service"),
        );
        assert_eq!(plain.reply_queue_for(Operation::CatGet), "cat.get.reply.queue");
        assert_eq!(
            named.reply_queue_for(Operation::CatGet),
            "cat.get.reply.queue.owner-service"
        );
    }

    #[tokio::test]
    async fn test_call_without_listener_times_out_and_leaves_no_state() {
        // Arrange
        let broker = InMemoryBroker::standard();
        let rpc = client(&broker, 50);

        // Act
        let result = rpc.call_op(Operation::CatGet, b"id".to_vec()).await;

        // Assert
        assert!(matches!(result, Err(RpcError::Timeout { .. })));
        assert_eq!(rpc.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_domain_timeout() {
        let err = RpcError::Timeout {
            routing_key: "owner.get".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            DomainError::from(err),
            DomainError::Timeout {
                operation: "owner.get".to_string(),
                timeout_ms: 250
            }
        );
    }

    #[tokio::test]
    async fn test_broker_failure_maps_to_unavailable() {
        let err = RpcError::Broker(BrokerError::Closed);
        assert!(matches!(DomainError::from(err), DomainError::Unavailable(_)));
    }
}
