//! Record store seam for the cat service.
//!
//! Reads go straight to the store.  Every write goes through
//! [`CatRepository::transaction`]: the closure sees its own staged writes,
//! and those writes become visible to readers all at once, only if the
//! closure returns `Ok`.  Transactions on one store are serialized.

use pets_core::{CatId, DomainError, OwnerId};

use crate::domain::cat::Cat;

/// Staged view of the store inside one transaction.
pub trait CatTransaction {
    /// Reads a cat, including writes staged earlier in this transaction.
    fn get(&self, id: CatId) -> Option<Cat>;

    /// Stages an insert or replace.
    fn put(&mut self, cat: Cat);

    /// Stages a delete.  Returns whether the cat existed.
    fn remove(&mut self, id: CatId) -> bool;

    /// Ids of every cat owned by `owner_id`, as seen by this transaction.
    fn ids_by_owner(&self, owner_id: OwnerId) -> Vec<CatId>;
}

/// Persistent storage for cats.
pub trait CatRepository: Send + Sync {
    fn find(&self, id: CatId) -> Result<Option<Cat>, DomainError>;

    fn find_all(&self) -> Result<Vec<Cat>, DomainError>;

    /// Runs `work` atomically.  Staged writes are discarded when `work`
    /// returns an error.
    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn CatTransaction) -> Result<T, DomainError>;
}
