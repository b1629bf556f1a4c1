//! # pets-cat-service
//!
//! Owns cat records and the friendship graph between them.
//!
//! # Layers
//!
//! - **`domain`** – The stored [`domain::cat::Cat`] record and the sort
//!   keys accepted by paged listing.
//! - **`application`** – [`application::cat_service::CatService`], the use
//!   cases behind every `cat.*` operation, plus the traits it depends on:
//!   the record store ([`application::repository::CatRepository`]) and the
//!   owner lookup ([`application::owner_directory::OwnerDirectory`]).
//! - **`infrastructure`** – The in-memory store, the RPC-backed owner
//!   directory, and the [`pets_core::RpcHandler`] that decodes requests and
//!   encodes replies.
//!
//! # Consistency rules enforced here
//!
//! - A cat is created or fully updated only after the owner service has
//!   confirmed its owner exists.
//! - Friendship is symmetric and never reflexive.  Both sides of an edge are
//!   written in one store transaction, so readers never see half an edge.
//! - Deleting a cat first removes it from every neighbour's friend list.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::cat_service::CatService;
pub use infrastructure::listener::CatMessageListener;
pub use infrastructure::memory_store::InMemoryCatRepository;
pub use infrastructure::owner_directory::RpcOwnerDirectory;
