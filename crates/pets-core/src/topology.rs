//! Broker topology shared by every service.
//!
//! All services agree on the same exchange, queue and routing-key names.
//! This module is the single place those names are spelled out.
//!
//! # Naming scheme
//!
//! ```text
//! exchange         cat.exchange / owner.exchange   (topic)
//! routing key      cat.makeFriends
//! request queue    cat.makeFriends.queue           (durable, dead-letters to cat.dlq)
//! reply queue      cat.makeFriends.reply.queue     (durable)
//! dead letters     cat.dlq / owner.dlq
//! ```
//!
//! # Topic routing (for beginners)
//!
//! A *topic exchange* compares the routing key of each published message
//! against the binding patterns of its queues, word by word (words are
//! separated by `.`).  `*` matches exactly one word and `#` matches zero or
//! more words.  A message is copied to every queue with a matching binding.
//!
//! The *default exchange* (empty name) is special: it delivers straight to
//! the queue whose name equals the routing key.  Replies and dead letters
//! travel this way.

use serde::{Deserialize, Serialize};

/// Name of the default (direct-to-queue) exchange.
pub const DEFAULT_EXCHANGE: &str = "";

/// Topic exchange carrying cat-domain requests.
pub const CAT_EXCHANGE: &str = "cat.exchange";

/// Topic exchange carrying owner-domain requests.
pub const OWNER_EXCHANGE: &str = "owner.exchange";

/// Dead-letter queue for requests the cat service could not process.
pub const CAT_DLQ: &str = "cat.dlq";

/// Dead-letter queue for requests the owner service could not process.
pub const OWNER_DLQ: &str = "owner.dlq";

// ── Operations ────────────────────────────────────────────────────────────────

/// Every request/reply operation in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CatCreate,
    CatGet,
    CatGetAll,
    CatMakeFriends,
    CatDeleteFriendship,
    CatDelete,
    CatDeleteByOwner,
    CatUpdate,
    OwnerCreate,
    OwnerGet,
    OwnerGetAll,
    OwnerChangeForPet,
    OwnerDeletePet,
    OwnerDelete,
    OwnerUpdate,
}

impl Operation {
    /// Operations served by the cat service.
    pub const CAT: [Operation; 8] = [
        Operation::CatCreate,
        Operation::CatGet,
        Operation::CatGetAll,
        Operation::CatMakeFriends,
        Operation::CatDeleteFriendship,
        Operation::CatDelete,
        Operation::CatDeleteByOwner,
        Operation::CatUpdate,
    ];

    /// Operations served by the owner service.
    pub const OWNER: [Operation; 7] = [
        Operation::OwnerCreate,
        Operation::OwnerGet,
        Operation::OwnerGetAll,
        Operation::OwnerChangeForPet,
        Operation::OwnerDeletePet,
        Operation::OwnerDelete,
        Operation::OwnerUpdate,
    ];

    /// Routing key, e.g. `cat.makeFriends`.
    pub fn routing_key(self) -> &'static str {
        match self {
            Operation::CatCreate => "cat.create",
            Operation::CatGet => "cat.get",
            Operation::CatGetAll => "cat.getAll",
            Operation::CatMakeFriends => "cat.makeFriends",
            Operation::CatDeleteFriendship => "cat.deleteFriendship",
            Operation::CatDelete => "cat.delete",
            Operation::CatDeleteByOwner => "cat.deleteByOwner",
            Operation::CatUpdate => "cat.update",
            Operation::OwnerCreate => "owner.create",
            Operation::OwnerGet => "owner.get",
            Operation::OwnerGetAll => "owner.getAll",
            Operation::OwnerChangeForPet => "owner.changeForPet",
            Operation::OwnerDeletePet => "owner.deletePet",
            Operation::OwnerDelete => "owner.delete",
            Operation::OwnerUpdate => "owner.update",
        }
    }

    /// `true` for operations served by the cat service.
    pub fn is_cat(self) -> bool {
        Operation::CAT.contains(&self)
    }

    /// Exchange the request is published to.
    pub fn exchange(self) -> &'static str {
        if self.is_cat() {
            CAT_EXCHANGE
        } else {
            OWNER_EXCHANGE
        }
    }

    /// Durable queue the serving listener consumes from.
    pub fn queue(self) -> String {
        format!("{}.queue", self.routing_key())
    }

    /// Canonical reply queue for this operation type.
    pub fn reply_queue(self) -> String {
        format!("{}.reply.queue", self.routing_key())
    }

    /// Dead-letter queue the request queue forwards failures to.
    pub fn dead_letter_queue(self) -> &'static str {
        if self.is_cat() {
            CAT_DLQ
        } else {
            OWNER_DLQ
        }
    }

    /// Looks an operation up by its request queue name.
    pub fn from_queue(queue: &str) -> Option<Operation> {
        Operation::CAT
            .into_iter()
            .chain(Operation::OWNER)
            .find(|op| op.queue() == queue)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.routing_key())
    }
}

// ── Declarations ──────────────────────────────────────────────────────────────

/// A named topic exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSpec {
    pub name: String,
}

/// A durable queue, optionally dead-lettering into another queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    /// Queue that rejected messages are routed to through the default exchange.
    pub dead_letter_queue: Option<String>,
}

impl QueueSpec {
    /// Durable queue without dead-lettering.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            dead_letter_queue: None,
        }
    }

    /// Durable queue dead-lettering into `dlq`.
    pub fn with_dead_letter(name: impl Into<String>, dlq: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            dead_letter_queue: Some(dlq.into()),
        }
    }
}

/// Binds `queue` to `exchange` for routing keys matching `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub exchange: String,
    pub queue: String,
    pub pattern: String,
}

/// Complete set of declarations a broker needs before services start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
}

impl Topology {
    /// The standard topology: both exchanges, both dead-letter queues, and a
    /// request queue, reply queue and binding for every [`Operation`].
    pub fn standard() -> Self {
        let mut topology = Topology {
            exchanges: vec![
                ExchangeSpec {
                    name: CAT_EXCHANGE.to_string(),
                },
                ExchangeSpec {
                    name: OWNER_EXCHANGE.to_string(),
                },
            ],
            queues: vec![QueueSpec::durable(CAT_DLQ), QueueSpec::durable(OWNER_DLQ)],
            bindings: Vec::new(),
        };

        for op in Operation::CAT.into_iter().chain(Operation::OWNER) {
            topology
                .queues
                .push(QueueSpec::with_dead_letter(op.queue(), op.dead_letter_queue()));
            topology.queues.push(QueueSpec::durable(op.reply_queue()));
            topology.bindings.push(BindingSpec {
                exchange: op.exchange().to_string(),
                queue: op.queue(),
                pattern: op.routing_key().to_string(),
            });
        }
        topology
    }
}

/// Matches a routing key against a topic binding pattern.
///
/// `*` matches exactly one word, `#` matches zero or more words.
///
/// # Examples
///
/// ```rust
/// use pets_core::topology::topic_matches;
///
/// assert!(topic_matches("cat.*", "cat.get"));
/// assert!(topic_matches("#", "owner.delete"));
/// assert!(!topic_matches("cat.*", "owner.get"));
/// ```
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_follow_scheme() {
        let op = Operation::CatMakeFriends;
        assert_eq!(op.exchange(), "cat.exchange");
        assert_eq!(op.routing_key(), "cat.makeFriends");
        assert_eq!(op.queue(), "cat.makeFriends.queue");
        assert_eq!(op.reply_queue(), "cat.makeFriends.reply.queue");
        assert_eq!(op.dead_letter_queue(), "cat.dlq");
    }

    #[test]
    fn test_owner_operations_use_owner_exchange() {
        for op in Operation::OWNER {
            assert_eq!(op.exchange(), OWNER_EXCHANGE);
            assert_eq!(op.dead_letter_queue(), OWNER_DLQ);
        }
    }

    #[test]
    fn test_from_queue_finds_operation() {
        assert_eq!(
            Operation::from_queue("owner.changeForPet.queue"),
            Some(Operation::OwnerChangeForPet)
        );
        assert_eq!(Operation::from_queue("nope.queue"), None);
    }

    #[test]
    fn test_standard_topology_declares_every_operation() {
        // Arrange / Act
        let topology = Topology::standard();

        // Assert: 15 operations × (request + reply) + 2 dead-letter queues
        assert_eq!(topology.queues.len(), 15 * 2 + 2);
        assert_eq!(topology.bindings.len(), 15);
        let request = topology
            .queues
            .iter()
            .find(|q| q.name == "cat.update.queue")
            .unwrap();
        assert_eq!(request.dead_letter_queue.as_deref(), Some("cat.dlq"));
    }

    #[test]
    fn test_topic_exact_match() {
        assert!(topic_matches("cat.get", "cat.get"));
        assert!(!topic_matches("cat.get", "cat.getAll"));
    }

    #[test]
    fn test_topic_star_matches_one_word_only() {
        assert!(topic_matches("cat.*", "cat.delete"));
        assert!(!topic_matches("cat.*", "cat.delete.extra"));
        assert!(!topic_matches("cat.*", "cat"));
    }

    #[test]
    fn test_topic_hash_matches_zero_or_more_words() {
        assert!(topic_matches("cat.#", "cat"));
        assert!(topic_matches("cat.#", "cat.a.b.c"));
        assert!(topic_matches("#.reply", "cat.get.reply"));
        assert!(!topic_matches("owner.#", "cat.get"));
    }
}
