//! Record store seam for the owner service.

use pets_core::{DomainError, OwnerId};

use crate::domain::owner::Owner;

/// Persistent storage for owners.  Each call is atomic on its own.
pub trait OwnerRepository: Send + Sync {
    fn find(&self, id: OwnerId) -> Result<Option<Owner>, DomainError>;

    fn find_all(&self) -> Result<Vec<Owner>, DomainError>;

    /// Inserts or replaces.
    fn save(&self, owner: Owner) -> Result<(), DomainError>;

    /// Replaces an existing owner.  Returns `false`, writing nothing, when
    /// the owner is not stored; a removed owner is never written back.
    fn update(&self, owner: Owner) -> Result<bool, DomainError>;

    /// Returns whether the owner existed.
    fn remove(&self, id: OwnerId) -> Result<bool, DomainError>;
}
