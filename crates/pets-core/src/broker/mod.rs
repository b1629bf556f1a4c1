//! The message broker seam.
//!
//! Services never talk to each other directly.  They publish [`Envelope`]s
//! to a [`Broker`] and consume deliveries from named queues.  Two
//! implementations exist:
//!
//! - [`memory::InMemoryBroker`] – everything in one process; used by the
//!   broker daemon itself and by tests.
//! - `RemoteBroker` in the `pets-broker` crate – the same trait over a TCP
//!   connection to the daemon.
//!
//! # Settling deliveries (for beginners)
//!
//! A consumer receives a [`Delivery`] and must *settle* it exactly once:
//!
//! | Call              | Effect                                              |
//! |-------------------|-----------------------------------------------------|
//! | `ack()`           | processed; the broker forgets the message           |
//! | `reject(reason)`  | unprocessable; moved to the queue's dead-letter queue |
//! | *(dropped)*       | not processed; put back on the queue for redelivery |
//!
//! Requeue-on-drop gives at-least-once delivery: a consumer that crashes or
//! bails out mid-flight never loses a message.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::envelope::Envelope;
use crate::topology::QueueSpec;

pub use memory::InMemoryBroker;

/// Errors raised by a [`Broker`] implementation.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The named queue has not been declared.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// The connection to a remote broker is gone.
    #[error("broker connection closed")]
    Closed,

    /// Transport-level failure talking to a remote broker.
    #[error("broker I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("broker protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    /// The broker refused the request.
    #[error("broker refused request: {0}")]
    Refused(String),
}

/// A message broker with topic routing, competing consumers and
/// dead-lettering.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declares `spec` if it does not exist yet.  Declaring an existing
    /// queue is a no-op.
    async fn declare_queue(&self, spec: QueueSpec) -> Result<(), BrokerError>;

    /// Routes `envelope` by its exchange and routing key.  A message that
    /// matches no queue is dropped.
    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError>;

    /// Starts consuming `queue`.  At most `prefetch` deliveries are handed
    /// out unsettled at any time.
    async fn consume(&self, queue: &str, prefetch: usize) -> Result<Consumer, BrokerError>;
}

/// How a delivery was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Reject(String),
    Requeue,
}

/// Receives the settlement of a delivery.  Implemented by each broker.
pub trait Settle: Send + Sync {
    fn settle(&self, delivery_tag: u64, settlement: Settlement);
}

/// One message handed to a consumer.
pub struct Delivery {
    tag: u64,
    queue: String,
    envelope: Envelope,
    settler: Arc<dyn Settle>,
    settled: bool,
}

impl Delivery {
    pub fn new(tag: u64, queue: impl Into<String>, envelope: Envelope, settler: Arc<dyn Settle>) -> Self {
        Self {
            tag,
            queue: queue.into(),
            envelope,
            settler,
            settled: false,
        }
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Queue this delivery was taken from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Marks the message as processed.
    pub fn ack(mut self) {
        self.finish(Settlement::Ack);
    }

    /// Moves the message to its dead-letter queue.
    pub fn reject(mut self, reason: impl Into<String>) {
        self.finish(Settlement::Reject(reason.into()));
    }

    /// Puts the message back on its queue.
    pub fn requeue(mut self) {
        self.finish(Settlement::Requeue);
    }

    fn finish(&mut self, settlement: Settlement) {
        self.settled = true;
        self.settler.settle(self.tag, settlement);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            self.finish(Settlement::Requeue);
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("queue", &self.queue)
            .field("routing_key", &self.envelope.routing_key)
            .field("settled", &self.settled)
            .finish()
    }
}

/// Stream of deliveries from one queue.
#[derive(Debug)]
pub struct Consumer {
    queue: String,
    rx: mpsc::Receiver<Delivery>,
}

impl Consumer {
    pub fn new(queue: impl Into<String>, rx: mpsc::Receiver<Delivery>) -> Self {
        Self {
            queue: queue.into(),
            rx,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the next delivery.  Returns `None` once the broker side has
    /// shut down.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSettler {
        calls: Mutex<Vec<(u64, Settlement)>>,
    }

    impl Settle for RecordingSettler {
        fn settle(&self, delivery_tag: u64, settlement: Settlement) {
            self.calls.lock().unwrap().push((delivery_tag, settlement));
        }
    }

    fn delivery(tag: u64, settler: &Arc<RecordingSettler>) -> Delivery {
        let settler: Arc<dyn Settle> = settler.clone();
        Delivery::new(tag, "q", Envelope::to_queue("q", Vec::new()), settler)
    }

    #[test]
    fn test_ack_settles_once() {
        // Arrange
        let settler = Arc::new(RecordingSettler::default());

        // Act
        delivery(1, &settler).ack();

        // Assert
        assert_eq!(*settler.calls.lock().unwrap(), vec![(1, Settlement::Ack)]);
    }

    #[test]
    fn test_reject_carries_reason() {
        let settler = Arc::new(RecordingSettler::default());
        delivery(2, &settler).reject("bad json");
        assert_eq!(
            *settler.calls.lock().unwrap(),
            vec![(2, Settlement::Reject("bad json".to_string()))]
        );
    }

    #[test]
    fn test_dropping_unsettled_delivery_requeues() {
        let settler = Arc::new(RecordingSettler::default());
        drop(delivery(3, &settler));
        assert_eq!(*settler.calls.lock().unwrap(), vec![(3, Settlement::Requeue)]);
    }
}
