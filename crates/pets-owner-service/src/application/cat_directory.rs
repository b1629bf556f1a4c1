//! Seam through which the owner service reaches cat records.
//!
//! Every method is a request to the cat service.  The cat service applies
//! its own validation to each of them (owner confirmation on update,
//! neighbour cleanup on delete), so the owner side never edits a cat
//! directly.

use async_trait::async_trait;
use pets_core::{CatDto, CatId, DomainError, OwnerId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatDirectory: Send + Sync {
    async fn get_cat(&self, id: CatId) -> Result<CatDto, DomainError>;

    /// Full-record update; returns the stored cat.
    async fn update_cat(&self, cat: CatDto) -> Result<CatDto, DomainError>;

    async fn delete_cat(&self, id: CatId) -> Result<(), DomainError>;

    /// Deletes every cat of `owner_id`.  `Ok` means the cat service
    /// acknowledged the whole cascade.
    async fn delete_cats_by_owner(&self, owner_id: OwnerId) -> Result<(), DomainError>;
}
