//! # pets-owner-service
//!
//! Owns owner records.  Everything that touches cats goes through the cat
//! service over RPC, via the [`application::cat_directory::CatDirectory`]
//! seam.
//!
//! # Cascade ordering
//!
//! Deleting an owner first asks the cat service to delete all of the
//! owner's cats.  Only when that request is acknowledged is the owner
//! record removed.  On a timeout or failure the owner stays: an owner with
//! no reachable cats is preferred over cats pointing at a deleted owner.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::owner_service::OwnerService;
pub use infrastructure::cat_directory::RpcCatDirectory;
pub use infrastructure::listener::OwnerMessageListener;
pub use infrastructure::memory_store::InMemoryOwnerRepository;
