//! In-process broker: topic exchanges, FIFO queues, competing consumers,
//! prefetch limits and dead-lettering.
//!
//! The broker daemon in `pets-broker` wraps one of these and exposes it over
//! TCP; tests use it directly.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::{Broker, BrokerError, Consumer, Delivery, Settle, Settlement};
use crate::protocol::envelope::Envelope;
use crate::topology::{topic_matches, BindingSpec, QueueSpec, Topology, DEFAULT_EXCHANGE};

/// Cheaply cloneable handle to a shared in-memory broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    next_tag: AtomicU64,
}

#[derive(Default)]
struct State {
    exchanges: HashSet<String>,
    bindings: Vec<BindingSpec>,
    queues: HashMap<String, QueueState>,
    in_flight: HashMap<u64, InFlight>,
}

struct QueueState {
    spec: QueueSpec,
    ready: VecDeque<Envelope>,
    notify: Arc<Notify>,
}

struct InFlight {
    queue: String,
    envelope: Envelope,
    // Released when the delivery is settled, freeing a prefetch slot.
    _permit: OwnedSemaphorePermit,
}

impl QueueState {
    fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            ready: VecDeque::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn push(&mut self, envelope: Envelope) {
        self.ready.push_back(envelope);
        self.notify.notify_one();
    }
}

impl InMemoryBroker {
    /// An empty broker with no exchanges or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker with `topology` already declared.
    pub fn with_topology(topology: &Topology) -> Self {
        let broker = Self::new();
        broker.apply_topology(topology);
        broker
    }

    /// A broker with the standard cat/owner topology declared.
    pub fn standard() -> Self {
        Self::with_topology(&Topology::standard())
    }

    /// Declares every exchange, queue and binding in `topology`.
    pub fn apply_topology(&self, topology: &Topology) {
        let mut state = self.inner.lock();
        for exchange in &topology.exchanges {
            state.exchanges.insert(exchange.name.clone());
        }
        for queue in &topology.queues {
            state.declare(queue.clone());
        }
        for binding in &topology.bindings {
            if !state.bindings.contains(binding) {
                state.bindings.push(binding.clone());
            }
        }
    }

    /// Number of messages waiting (not in flight) on `queue`.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    /// Copies of the messages waiting on `queue`, oldest first.  Intended
    /// for out-of-band inspection of dead-letter queues.
    pub fn peek(&self, queue: &str) -> Vec<Envelope> {
        self.inner
            .lock()
            .queues
            .get(queue)
            .map(|q| q.ready.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn pump(
        self,
        queue: String,
        semaphore: Arc<Semaphore>,
        tx: mpsc::Sender<Delivery>,
    ) {
        let notify = match self.inner.lock().queues.get(&queue) {
            Some(q) => q.notify.clone(),
            None => return,
        };

        loop {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = tx.closed() => return,
            };

            let mut permit = Some(permit);
            let (tag, envelope) = loop {
                if let Some(taken) = self.inner.take_next(&queue, &mut permit) {
                    break taken;
                }
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = tx.closed() => return,
                }
            };

            let settler: Arc<dyn Settle> = self.inner.clone();
            let delivery = Delivery::new(tag, queue.clone(), envelope, settler);
            if tx.send(delivery).await.is_err() {
                // The returned delivery is dropped here and requeued.
                debug!(queue = %queue, "consumer went away");
                return;
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pops the head of `queue` and records it as in flight, consuming the
    /// prefetch permit.  Leaves the permit in place when the queue is empty.
    fn take_next(
        &self,
        queue: &str,
        permit: &mut Option<OwnedSemaphorePermit>,
    ) -> Option<(u64, Envelope)> {
        permit.as_ref()?;
        let mut state = self.lock();
        let envelope = state.queues.get_mut(queue)?.ready.pop_front()?;
        let _permit = permit.take()?;
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed) + 1;
        state.in_flight.insert(
            tag,
            InFlight {
                queue: queue.to_string(),
                envelope: envelope.clone(),
                _permit,
            },
        );
        Some((tag, envelope))
    }
}

impl State {
    fn declare(&mut self, spec: QueueSpec) {
        self.queues
            .entry(spec.name.clone())
            .or_insert_with(|| QueueState::new(spec));
    }

    /// Routes one envelope.  Returns how many queues received a copy.
    fn route(&mut self, envelope: Envelope) -> Result<usize, BrokerError> {
        if envelope.exchange == DEFAULT_EXCHANGE {
            return Ok(match self.queues.get_mut(&envelope.routing_key) {
                Some(queue) => {
                    queue.push(envelope);
                    1
                }
                None => 0,
            });
        }

        if !self.exchanges.contains(&envelope.exchange) {
            return Err(BrokerError::Refused(format!(
                "unknown exchange '{}'",
                envelope.exchange
            )));
        }

        let mut targets: Vec<String> = Vec::new();
        for binding in &self.bindings {
            if binding.exchange == envelope.exchange
                && topic_matches(&binding.pattern, &envelope.routing_key)
                && !targets.contains(&binding.queue)
            {
                targets.push(binding.queue.clone());
            }
        }

        let mut routed = 0;
        for name in targets {
            if let Some(queue) = self.queues.get_mut(&name) {
                queue.push(envelope.clone());
                routed += 1;
            }
        }
        Ok(routed)
    }
}

impl Settle for Inner {
    fn settle(&self, delivery_tag: u64, settlement: Settlement) {
        let mut state = self.lock();
        let Some(in_flight) = state.in_flight.remove(&delivery_tag) else {
            debug!(delivery_tag, "settlement for unknown delivery ignored");
            return;
        };

        match settlement {
            Settlement::Ack => {}
            Settlement::Requeue => {
                if let Some(queue) = state.queues.get_mut(&in_flight.queue) {
                    queue.ready.push_front(in_flight.envelope);
                    queue.notify.notify_one();
                }
            }
            Settlement::Reject(reason) => {
                let dlq = state
                    .queues
                    .get(&in_flight.queue)
                    .and_then(|q| q.spec.dead_letter_queue.clone());
                let Some(dlq) = dlq else {
                    warn!(
                        queue = %in_flight.queue,
                        reason = %reason,
                        "rejected message dropped: queue has no dead-letter queue"
                    );
                    return;
                };
                warn!(
                    queue = %in_flight.queue,
                    dlq = %dlq,
                    routing_key = %in_flight.envelope.routing_key,
                    reason = %reason,
                    "message dead-lettered"
                );
                let dead = in_flight
                    .envelope
                    .dead_lettered(&in_flight.queue, &dlq, &reason);
                match state.queues.get_mut(&dlq) {
                    Some(queue) => queue.push(dead),
                    None => warn!(dlq = %dlq, "dead-letter queue not declared; message dropped"),
                }
            }
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, spec: QueueSpec) -> Result<(), BrokerError> {
        self.inner.lock().declare(spec);
        Ok(())
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        let exchange = envelope.exchange.clone();
        let routing_key = envelope.routing_key.clone();
        let routed = self.inner.lock().route(envelope)?;
        if routed == 0 {
            warn!(exchange = %exchange, routing_key = %routing_key, "unroutable message dropped");
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: usize) -> Result<Consumer, BrokerError> {
        if !self.inner.lock().queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_string()));
        }
        let prefetch = prefetch.max(1);
        let (tx, rx) = mpsc::channel(prefetch);
        let semaphore = Arc::new(Semaphore::new(prefetch));
        tokio::spawn(self.clone().pump(queue.to_string(), semaphore, tx));
        Ok(Consumer::new(queue, rx))
    }
}
