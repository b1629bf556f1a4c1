//! # pets-core
//!
//! Shared library for the pets services containing the record shapes, the
//! RPC envelope and payload encoding, the broker topology, and the
//! request/reply transport that turns an asynchronous message broker into
//! something that behaves like a synchronous call.
//!
//! # Architecture overview (for beginners)
//!
//! The system is split into independently deployed services that share no
//! database.  The *cat service* owns cat records and the friendship graph,
//! the *owner service* owns owner records, and the *gateway* sits at the
//! edge.  They talk to each other only through a message broker.
//!
//! This crate (`pets-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The records that travel between services (`CatDto`,
//!   `OwnerDto`, pages) plus the error taxonomy and the friendship
//!   reconciliation diff.
//!
//! - **`protocol`** – How a request looks on the broker: an [`Envelope`]
//!   carrying a correlation id, a reply queue, and an opaque JSON payload.
//!   It also contains the binary frame codec used on the TCP link between a
//!   service and the broker daemon.
//!
//! - **`topology`** – The named exchanges, queues, routing keys and
//!   dead-letter queues every service agrees on.
//!
//! - **`broker`** – The [`Broker`] trait plus an in-memory implementation
//!   (used by the broker daemon and by tests).
//!
//! - **`rpc`** – The caller side ([`RpcClient`]) with its correlation-id
//!   keyed waiting registry, and the callee side ([`RpcListener`]).

pub mod broker;
pub mod config;
pub mod domain;
pub mod protocol;
pub mod rpc;
pub mod topology;

// Re-export the most-used types at the crate root so callers can write
// `pets_core::CatDto` instead of `pets_core::domain::cat::CatDto`.
pub use broker::{Broker, BrokerError, Consumer, Delivery};
pub use domain::cat::{CatDto, CatId, Color, CreateCatRequest};
pub use domain::error::DomainError;
pub use domain::owner::{CreateOwnerRequest, OwnerDto, OwnerId};
pub use domain::paging::{Page, PageRequest, SortDirection};
pub use protocol::envelope::{CorrelationId, Envelope};
pub use rpc::{RpcClient, RpcConfig, RpcError, RpcHandler, RpcListener};
pub use topology::{Operation, Topology};
