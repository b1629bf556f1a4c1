//! # pets-broker
//!
//! A small message broker daemon.  It owns one
//! [`pets_core::broker::InMemoryBroker`] with the standard topology and
//! exposes it over TCP using the binary frame protocol from
//! [`pets_core::protocol::codec`].
//!
//! Services connect with [`infrastructure::client::RemoteBroker`], which
//! implements the same [`pets_core::Broker`] trait as the in-memory broker,
//! so RPC code does not care which one it is given.
//!
//! ```text
//! cat-service ──┐                         ┌── owner-service
//!  RemoteBroker │ ◄── frames over TCP ──► │ RemoteBroker
//!               └──►  pets-broker  ◄──────┘
//!                     InMemoryBroker
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::config::BrokerConfig;
pub use infrastructure::client::RemoteBroker;
pub use infrastructure::server::{run_server, serve};
