//! The RPC envelope: correlation id, reply destination, opaque payload.
//!
//! # Request/reply over a broker (for beginners)
//!
//! A broker only moves messages from publishers to queues.  To make a call
//! that *looks* synchronous, the caller attaches two things to its request:
//!
//! - a **correlation id** that is unique to this one call, and
//! - a **reply queue** name telling the callee where to send the answer.
//!
//! The callee publishes its answer to that queue with the *same*
//! correlation id.  The caller, which is consuming the reply queue, uses the
//! id to hand the answer to exactly the one task that is waiting for it.
//!
//! ```text
//! caller ── request {corr=7, reply_to=cat.get.reply.queue} ──► cat.get.queue
//! caller ◄── reply  {corr=7} ─────────────── cat.get.reply.queue ◄── callee
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::topology::DEFAULT_EXCHANGE;

/// Single-use token matching one reply to one waiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where and why a message was dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Queue the message was rejected from.
    pub queue: String,
    /// Human-readable rejection reason.
    pub reason: String,
    /// How many times this message has been dead-lettered.
    pub count: u32,
}

/// A message as the broker sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Exchange the message was published to (`""` for direct-to-queue).
    pub exchange: String,
    /// Routing key used to pick the destination queue(s).
    pub routing_key: String,
    /// Present on requests and on replies; absent on fire-and-forget messages.
    pub correlation_id: Option<CorrelationId>,
    /// Queue the reply must be published to.
    pub reply_to: Option<String>,
    /// Set once the message has been dead-lettered.
    pub death: Option<DeathRecord>,
    /// Opaque payload (JSON, UUID text, or empty for acknowledge-only).
    pub body: Vec<u8>,
}

impl Envelope {
    /// Builds a request addressed to `exchange`/`routing_key`.
    pub fn request(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        correlation_id: CorrelationId,
        reply_to: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            correlation_id: Some(correlation_id),
            reply_to: Some(reply_to.into()),
            death: None,
            body,
        }
    }

    /// Builds a message delivered straight to `queue` through the default
    /// exchange.
    pub fn to_queue(queue: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: queue.into(),
            correlation_id: None,
            reply_to: None,
            death: None,
            body,
        }
    }

    /// Builds the reply to this request, echoing the correlation id
    /// unchanged.
    ///
    /// Returns `None` when the request did not name a reply queue.
    pub fn reply(&self, body: Vec<u8>) -> Option<Envelope> {
        let reply_to = self.reply_to.as_ref()?;
        Some(Envelope {
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: reply_to.clone(),
            correlation_id: self.correlation_id,
            reply_to: None,
            death: None,
            body,
        })
    }

    /// Re-addresses this message to `dlq`, recording where it came from.
    pub fn dead_lettered(mut self, from_queue: &str, dlq: &str, reason: &str) -> Envelope {
        let count = self.death.as_ref().map_or(0, |d| d.count) + 1;
        self.death = Some(DeathRecord {
            queue: from_queue.to_string(),
            reason: reason.to_string(),
            count,
        });
        self.exchange = DEFAULT_EXCHANGE.to_string();
        self.routing_key = dlq.to_string();
        self
    }
}
