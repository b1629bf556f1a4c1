//! Callee side of the RPC protocol.
//!
//! An [`RpcListener`] consumes the request queue of every operation a
//! service serves.  For each request it:
//!
//! 1. Runs the [`RpcHandler`] in its own task, so a panicking handler never
//!    takes the consuming loop down with it.
//! 2. Publishes the handler's reply to the request's `reply_to` queue with
//!    the request's correlation id, unless the handler chose to stay
//!    silent (the caller then sees a timeout, which it reads as "absent").
//! 3. Acks the request.  Malformed requests and handler failures are
//!    rejected instead, which moves them to the dead-letter queue.
//!
//! At most `concurrency` requests per queue are processed at once.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, BrokerError, Consumer, Delivery};
use crate::protocol::payload::PayloadError;
use crate::topology::Operation;

/// How often an idle consuming loop re-checks the `running` flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What a handler wants sent back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerReply {
    /// Publish this body as the reply.
    Body(Vec<u8>),
    /// Publish nothing.  Used for "no reply on absence" operations.
    Silent,
}

/// A request the handler could not process.  The request is dead-lettered.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("operation {0} is not served here")]
    Unsupported(Operation),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PayloadError> for HandlerError {
    fn from(err: PayloadError) -> Self {
        HandlerError::Malformed(err.to_string())
    }
}

/// Executes one request for a domain service.
///
/// Domain failures (not found, validation) are *not* errors here: the
/// handler turns them into a negative reply or [`HandlerReply::Silent`].
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError>;
}

/// Serves a set of operations from their request queues.
pub struct RpcListener {
    broker: Arc<dyn Broker>,
    handler: Arc<dyn RpcHandler>,
    concurrency: usize,
    running: Arc<AtomicBool>,
}

impl RpcListener {
    pub fn new(broker: Arc<dyn Broker>, handler: Arc<dyn RpcHandler>, concurrency: usize) -> Self {
        Self {
            broker,
            handler,
            concurrency: concurrency.max(1),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared shutdown flag.  Clearing it stops every consuming loop within
    /// one poll interval.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Starts consuming the request queue of every operation in `ops`.
    ///
    /// Returns once all consumers are registered; the loops keep running in
    /// background tasks until the `running` flag is cleared.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] if any request queue cannot be consumed.
    pub async fn start(&self, ops: &[Operation]) -> Result<Vec<tokio::task::JoinHandle<()>>, BrokerError> {
        let mut handles = Vec::with_capacity(ops.len());
        for &op in ops {
            let consumer = self.broker.consume(&op.queue(), self.concurrency).await?;
            info!("listening on {}", op.queue());
            handles.push(tokio::spawn(serve_queue(
                op,
                consumer,
                Arc::clone(&self.broker),
                Arc::clone(&self.handler),
                Arc::new(Semaphore::new(self.concurrency)),
                Arc::clone(&self.running),
            )));
        }
        Ok(handles)
    }

    /// Starts every operation in `ops` and waits until the listener is
    /// stopped.
    ///
    /// # Errors
    ///
    /// See [`RpcListener::start`].
    pub async fn run(&self, ops: &[Operation]) -> Result<(), BrokerError> {
        for handle in self.start(ops).await? {
            if let Err(e) = handle.await {
                error!("listener task failed: {e}");
            }
        }
        Ok(())
    }
}

// ── Consuming loop ────────────────────────────────────────────────────────────

async fn serve_queue(
    op: Operation,
    mut consumer: Consumer,
    broker: Arc<dyn Broker>,
    handler: Arc<dyn RpcHandler>,
    slots: Arc<Semaphore>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("stopping listener for {op}");
            break;
        }

        let delivery = match timeout(POLL_INTERVAL, consumer.recv()).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                warn!("request stream for {op} closed");
                break;
            }
            Err(_) => continue,
        };

        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let broker = Arc::clone(&broker);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            process(op, delivery, broker, handler).await;
            drop(permit);
        });
    }
}

async fn process(
    op: Operation,
    delivery: Delivery,
    broker: Arc<dyn Broker>,
    handler: Arc<dyn RpcHandler>,
) {
    let body = delivery.envelope().body.clone();
    let correlation_id = delivery.envelope().correlation_id;
    debug!(?correlation_id, routing_key = %op, "handling request");

    // Inner task: a panic inside the handler surfaces as a JoinError.
    let outcome = tokio::spawn(async move { handler.handle(op, &body).await }).await;

    match outcome {
        Ok(Ok(HandlerReply::Body(reply_body))) => {
            let Some(reply) = delivery.envelope().reply(reply_body) else {
                warn!(?correlation_id, routing_key = %op, "request has no reply_to; reply dropped");
                delivery.ack();
                return;
            };
            match broker.publish(reply).await {
                Ok(()) => delivery.ack(),
                Err(e) => {
                    error!(?correlation_id, routing_key = %op, "failed to publish reply: {e}");
                    delivery.requeue();
                }
            }
        }
        Ok(Ok(HandlerReply::Silent)) => {
            debug!(?correlation_id, routing_key = %op, "no reply for this request");
            delivery.ack();
        }
        Ok(Err(e)) => {
            warn!(?correlation_id, routing_key = %op, "request rejected: {e}");
            delivery.reject(e.to_string());
        }
        Err(e) => {
            error!(?correlation_id, routing_key = %op, "handler panicked: {e}");
            delivery.reject(format!("handler panicked: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::protocol::envelope::{CorrelationId, Envelope};
    use crate::topology::CAT_DLQ;

    struct EchoHandler;

    #[async_trait]
    impl RpcHandler for EchoHandler {
        async fn handle(&self, op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
            match body {
                b"silent" => Ok(HandlerReply::Silent),
                b"bad" => Err(HandlerError::Malformed("bad body".to_string())),
                b"panic" => panic!("boom"),
                _ => Ok(HandlerReply::Body(format!("{op}:{}", body.len()).into_bytes())),
            }
        }
    }

    async fn started(broker: &InMemoryBroker) -> RpcListener {
        let listener = RpcListener::new(Arc::new(broker.clone()), Arc::new(EchoHandler), 4);
        listener.start(&[Operation::CatGet]).await.unwrap();
        listener
    }

    fn request(body: &[u8]) -> (CorrelationId, Envelope) {
        let corr = CorrelationId::new();
        let env = Envelope::request(
            "cat.exchange",
            "cat.get",
            corr,
            "cat.get.reply.queue",
            body.to_vec(),
        );
        (corr, env)
    }

    async fn wait_for_depth(broker: &InMemoryBroker, queue: &str, depth: usize) {
        for _ in 0..100 {
            if broker.queue_depth(queue) >= depth {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue {queue} never reached depth {depth}");
    }

    #[tokio::test]
    async fn test_reply_echoes_correlation_id() {
        // Arrange
        let broker = InMemoryBroker::standard();
        let _listener = started(&broker).await;
        let (corr, env) = request(b"abc");

        // Act
        broker.publish(env).await.unwrap();
        wait_for_depth(&broker, "cat.get.reply.queue", 1).await;

        // Assert
        let replies = broker.peek("cat.get.reply.queue");
        assert_eq!(replies[0].correlation_id, Some(corr));
        assert_eq!(replies[0].body, b"cat.get:3");
    }

    #[tokio::test]
    async fn test_silent_handler_publishes_nothing() {
        let broker = InMemoryBroker::standard();
        let _listener = started(&broker).await;
        broker.publish(request(b"silent").1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(broker.queue_depth("cat.get.reply.queue"), 0);
        assert_eq!(broker.queue_depth(CAT_DLQ), 0);
        assert_eq!(broker.queue_depth("cat.get.queue"), 0);
    }

    #[tokio::test]
    async fn test_malformed_request_is_dead_lettered() {
        let broker = InMemoryBroker::standard();
        let _listener = started(&broker).await;
        broker.publish(request(b"bad").1).await.unwrap();

        wait_for_depth(&broker, CAT_DLQ, 1).await;

        let dead = broker.peek(CAT_DLQ);
        assert_eq!(dead[0].body, b"bad");
        assert_eq!(broker.queue_depth("cat.get.reply.queue"), 0);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_dead_lettered_and_loop_survives() {
        // Arrange
        let broker = InMemoryBroker::standard();
        let _listener = started(&broker).await;

        // Act
        broker.publish(request(b"panic").1).await.unwrap();
        wait_for_depth(&broker, CAT_DLQ, 1).await;
        broker.publish(request(b"ok").1).await.unwrap();

        // Assert
        wait_for_depth(&broker, "cat.get.reply.queue", 1).await;
    }

    #[tokio::test]
    async fn test_cleared_running_flag_stops_consuming() {
        let broker = InMemoryBroker::standard();
        let listener = RpcListener::new(Arc::new(broker.clone()), Arc::new(EchoHandler), 1);
        let handles = listener.start(&[Operation::CatGet]).await.unwrap();

        listener.running_flag().store(false, Ordering::Relaxed);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
        }

        broker.publish(request(b"late").1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.queue_depth("cat.get.queue"), 1);
    }
}
