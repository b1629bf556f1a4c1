//! OwnerService: the use cases behind every `owner.*` operation.
//!
//! # Cascade before delete
//!
//! [`OwnerService::delete_owner`] asks the cat service to delete the
//! owner's cats and waits for the acknowledgement.  The owner record is
//! removed only after that.  No reply, or an error, leaves the owner in
//! place and is reported to the caller.
//!
//! # Pet operations
//!
//! `change_owner_for_pet` and `delete_pet` are built entirely from the cat
//! service's own `get` / `update` / `delete` requests.  The cat service
//! validates the new owner by calling back into `owner.get`, exactly as it
//! does for a direct update.

use std::sync::Arc;

use chrono::NaiveDate;
use pets_core::domain::today;
use pets_core::{CatId, CreateOwnerRequest, DomainError, OwnerDto, OwnerId, Page, PageRequest};
use tracing::{debug, info, warn};

use super::cat_directory::CatDirectory;
use super::repository::OwnerRepository;
use crate::domain::owner::Owner;
use crate::domain::sorting::{sort_owners, OwnerSortKey};

/// Owner use cases over a record store `R`.
pub struct OwnerService<R: OwnerRepository> {
    repository: R,
    cats: Arc<dyn CatDirectory>,
    clock: fn() -> NaiveDate,
}

impl<R: OwnerRepository> OwnerService<R> {
    pub fn new(repository: R, cats: Arc<dyn CatDirectory>) -> Self {
        Self {
            repository,
            cats,
            clock: today,
        }
    }

    /// Replaces the source of "today" used by birth-date validation.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    // ── Records ───────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// `Validation` for blank names or a birth date not in the past.
    pub fn create_owner(&self, request: CreateOwnerRequest) -> Result<OwnerDto, DomainError> {
        request.validate((self.clock)())?;
        let owner = Owner::create(request);
        let dto = owner.to_dto();
        self.repository.save(owner)?;
        info!(owner_id = %dto.id, "owner created");
        Ok(dto)
    }

    /// # Errors
    ///
    /// `NotFound` when no owner has this id.
    pub fn get_owner(&self, id: OwnerId) -> Result<OwnerDto, DomainError> {
        self.repository
            .find(id)?
            .map(|owner| owner.to_dto())
            .ok_or_else(|| DomainError::not_found("owner", id))
    }

    /// # Errors
    ///
    /// `Validation` when the page size is zero.
    pub fn get_all_owners(&self, request: &PageRequest) -> Result<Page<OwnerDto>, DomainError> {
        request.validate()?;
        let mut owners = self.repository.find_all()?;
        sort_owners(&mut owners, OwnerSortKey::parse(&request.sort_by), request.sort_dir);
        Ok(Page::from_sorted(owners, request).map(|owner| owner.to_dto()))
    }

    /// Replaces first name, last name and birth date.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields; `NotFound` when the owner is missing.
    pub fn update_owner(&self, dto: OwnerDto) -> Result<OwnerDto, DomainError> {
        dto.validate((self.clock)())?;
        let mut owner = self
            .repository
            .find(dto.id)?
            .ok_or_else(|| DomainError::not_found("owner", dto.id))?;
        owner.apply_update(&dto);
        let updated = owner.to_dto();
        // The owner may have been deleted since it was read.
        if !self.repository.update(owner)? {
            return Err(DomainError::not_found("owner", dto.id));
        }
        info!(owner_id = %updated.id, "owner updated");
        Ok(updated)
    }

    /// Deletes the owner after its cats.  Returns `false` when the owner did
    /// not exist (nothing is sent to the cat service then).
    ///
    /// # Errors
    ///
    /// Whatever the cascade request failed with (`Timeout`, `Unavailable`).
    /// The owner is still stored in that case.
    pub async fn delete_owner(&self, id: OwnerId) -> Result<bool, DomainError> {
        if self.repository.find(id)?.is_none() {
            debug!(owner_id = %id, "delete of absent owner ignored");
            return Ok(false);
        }

        if let Err(e) = self.cats.delete_cats_by_owner(id).await {
            warn!(owner_id = %id, "cascade to cats failed, owner kept: {e}");
            return Err(e);
        }

        self.repository.remove(id)?;
        info!(owner_id = %id, "owner deleted after cascade");
        Ok(true)
    }

    // ── Pets ──────────────────────────────────────────────────────────────────

    /// Moves `pet_id` to `owner_id`.  `true` only when the cat service
    /// confirmed the update.
    ///
    /// # Errors
    ///
    /// Only local store failures; every remote failure is `Ok(false)`.
    pub async fn change_owner_for_pet(
        &self,
        owner_id: OwnerId,
        pet_id: CatId,
    ) -> Result<bool, DomainError> {
        if self.repository.find(owner_id)?.is_none() {
            debug!(owner_id = %owner_id, "changeForPet to unknown owner refused");
            return Ok(false);
        }

        let mut cat = match self.cats.get_cat(pet_id).await {
            Ok(cat) => cat,
            Err(e) => {
                debug!(pet_id = %pet_id, "changeForPet: pet not resolved: {e}");
                return Ok(false);
            }
        };
        if cat.owner_id == owner_id {
            return Ok(true);
        }

        let previous = cat.owner_id;
        cat.owner_id = owner_id;
        match self.cats.update_cat(cat).await {
            Ok(updated) => {
                info!(pet_id = %pet_id, from = %previous, to = %updated.owner_id, "pet changed owner");
                Ok(true)
            }
            Err(e) => {
                warn!(pet_id = %pet_id, owner_id = %owner_id, "pet owner change not applied: {e}");
                Ok(false)
            }
        }
    }

    /// Deletes `pet_id` if it belongs to `owner_id`.
    ///
    /// # Errors
    ///
    /// Never for remote failures; those yield `Ok(false)`.
    pub async fn delete_pet(&self, owner_id: OwnerId, pet_id: CatId) -> Result<bool, DomainError> {
        let cat = match self.cats.get_cat(pet_id).await {
            Ok(cat) => cat,
            Err(e) => {
                debug!(pet_id = %pet_id, "deletePet: pet not resolved: {e}");
                return Ok(false);
            }
        };
        if cat.owner_id != owner_id {
            debug!(pet_id = %pet_id, owner_id = %owner_id, actual = %cat.owner_id, "deletePet: not this owner's pet");
            return Ok(false);
        }

        match self.cats.delete_cat(pet_id).await {
            Ok(()) => {
                info!(pet_id = %pet_id, owner_id = %owner_id, "pet deleted by owner");
                Ok(true)
            }
            Err(e) => {
                warn!(pet_id = %pet_id, "pet delete not confirmed: {e}");
                Ok(false)
            }
        }
    }
}
