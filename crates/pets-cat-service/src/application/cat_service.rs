//! CatService: the use cases behind every `cat.*` operation.
//!
//! # Ownership validation
//!
//! `create_cat` and `update_cat` ask the owner service for the owner record
//! *before* opening a store transaction.  If the owner cannot be confirmed
//! (not found, no reply, broker down) the write is abandoned and nothing is
//! stored.  The RPC never runs while a transaction is open, so a slow owner
//! service cannot hold the store lock.
//!
//! # Friend list reconciliation
//!
//! `update_cat` treats `dto.friends` as the desired final adjacency set.
//! Inside one transaction it checks every desired friend exists, computes a
//! [`FriendshipDiff`] against the current set, and applies each removal and
//! addition through the same edge helpers as `make_friends` and
//! `delete_friendship`.  Any failure discards the whole transaction.

use std::sync::Arc;

use chrono::NaiveDate;
use pets_core::domain::friendship::FriendshipDiff;
use pets_core::domain::today;
use pets_core::{CatDto, CatId, CreateCatRequest, DomainError, OwnerId, Page, PageRequest};
use tracing::{debug, info, warn};

use super::friendship::{detach_and_remove, link, unlink};
use super::owner_directory::OwnerDirectory;
use super::repository::CatRepository;
use crate::domain::cat::Cat;
use crate::domain::sorting::{sort_cats, CatSortKey};

/// Cat use cases over a record store `R`.
pub struct CatService<R: CatRepository> {
    repository: R,
    owners: Arc<dyn OwnerDirectory>,
    clock: fn() -> NaiveDate,
}

impl<R: CatRepository> CatService<R> {
    pub fn new(repository: R, owners: Arc<dyn OwnerDirectory>) -> Self {
        Self {
            repository,
            owners,
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

    /// Creates a cat after confirming its owner exists.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields; `NotFound`, `Timeout` or `Unavailable`
    /// when the owner cannot be confirmed.  No record is created on error.
    pub async fn create_cat(&self, request: CreateCatRequest) -> Result<CatDto, DomainError> {
        request.validate((self.clock)())?;
        self.confirm_owner(request.owner_id).await?;

        let cat = Cat::create(request);
        let dto = cat.to_dto();
        self.repository.transaction(|tx| {
            tx.put(cat);
            Ok(())
        })?;
        info!(cat_id = %dto.id, owner_id = %dto.owner_id, "cat created");
        Ok(dto)
    }

    /// # Errors
    ///
    /// `NotFound` when no cat has this id.
    pub async fn get_cat(&self, id: CatId) -> Result<CatDto, DomainError> {
        self.repository
            .find(id)?
            .map(|cat| cat.to_dto())
            .ok_or_else(|| DomainError::not_found("cat", id))
    }

    /// One sorted page of all cats.
    ///
    /// # Errors
    ///
    /// `Validation` when the page size is zero.
    pub async fn get_all_cats(&self, request: &PageRequest) -> Result<Page<CatDto>, DomainError> {
        request.validate()?;
        let mut cats = self.repository.find_all()?;
        sort_cats(&mut cats, CatSortKey::parse(&request.sort_by), request.sort_dir);
        Ok(Page::from_sorted(cats, request).map(|cat| cat.to_dto()))
    }

    /// Replaces a cat's fields and reconciles its friend list to
    /// `dto.friends`.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields, a self-reference in `friends`, or a
    /// friend id that does not resolve; `NotFound` when the cat is missing;
    /// owner confirmation errors as for [`CatService::create_cat`].  The
    /// stored cat is unchanged on error.
    pub async fn update_cat(&self, dto: CatDto) -> Result<CatDto, DomainError> {
        dto.validate((self.clock)())?;
        if dto.friends.contains(&dto.id) {
            return Err(DomainError::validation(format!(
                "cat {} cannot list itself as a friend",
                dto.id
            )));
        }
        if self.repository.find(dto.id)?.is_none() {
            return Err(DomainError::not_found("cat", dto.id));
        }
        self.confirm_owner(dto.owner_id).await?;

        let updated = self.repository.transaction(|tx| {
            let current = tx
                .get(dto.id)
                .ok_or_else(|| DomainError::not_found("cat", dto.id))?;

            if let Some(missing) = dto.friends.iter().find(|id| tx.get(**id).is_none()) {
                return Err(DomainError::validation(format!(
                    "friend {missing} does not exist"
                )));
            }

            let current_friends: Vec<CatId> = current.friends.iter().copied().collect();
            let diff = FriendshipDiff::between(&current_friends, &dto.friends);
            for friend in &diff.to_remove {
                unlink(tx, dto.id, *friend)?;
            }
            for friend in &diff.to_add {
                link(tx, dto.id, *friend)?;
            }

            let mut cat = tx
                .get(dto.id)
                .ok_or_else(|| DomainError::not_found("cat", dto.id))?;
            cat.apply_scalars(&dto);
            let result = cat.to_dto();
            tx.put(cat);
            debug!(
                cat_id = %dto.id,
                removed = diff.to_remove.len(),
                added = diff.to_add.len(),
                "friend list reconciled"
            );
            Ok(result)
        })?;
        info!(cat_id = %updated.id, "cat updated");
        Ok(updated)
    }

    /// Deletes a cat and every edge touching it.  Returns `false` when it was
    /// already gone.
    ///
    /// # Errors
    ///
    /// Only store failures.
    pub async fn delete_cat(&self, id: CatId) -> Result<bool, DomainError> {
        let existed = self
            .repository
            .transaction(|tx| Ok(detach_and_remove(tx, id)))?;
        if existed {
            info!(cat_id = %id, "cat deleted");
        } else {
            debug!(cat_id = %id, "delete of absent cat ignored");
        }
        Ok(existed)
    }

    /// Deletes every cat of `owner_id`, cleaning up friend lists exactly as
    /// [`CatService::delete_cat`] does.  Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Only store failures; on error no cat is removed.
    pub async fn delete_cats_by_owner(&self, owner_id: OwnerId) -> Result<usize, DomainError> {
        let removed = self.repository.transaction(|tx| {
            let mut removed = 0;
            for id in tx.ids_by_owner(owner_id) {
                if detach_and_remove(tx, id) {
                    removed += 1;
                }
            }
            Ok(removed)
        })?;
        info!(owner_id = %owner_id, removed, "cats of owner deleted");
        Ok(removed)
    }

    // ── Friendship ────────────────────────────────────────────────────────────

    /// Makes `a` and `b` friends.  Succeeds without change when they already
    /// are.
    ///
    /// # Errors
    ///
    /// `Validation` when `a == b` (whether or not the cat exists);
    /// `NotFound` when either cat is missing.
    pub async fn make_friends(&self, a: CatId, b: CatId) -> Result<(), DomainError> {
        let created = self.repository.transaction(|tx| link(tx, a, b))?;
        if created {
            info!(cat_a = %a, cat_b = %b, "friendship created");
        }
        Ok(())
    }

    /// Ends the friendship between `a` and `b`.  Returns whether there was
    /// one.
    ///
    /// # Errors
    ///
    /// As for [`CatService::make_friends`].
    pub async fn delete_friendship(&self, a: CatId, b: CatId) -> Result<bool, DomainError> {
        let existed = self.repository.transaction(|tx| unlink(tx, a, b))?;
        if existed {
            info!(cat_a = %a, cat_b = %b, "friendship removed");
        }
        Ok(existed)
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn confirm_owner(&self, owner_id: OwnerId) -> Result<(), DomainError> {
        match self.owners.find_owner(owner_id).await {
            Ok(owner) if owner.id == owner_id => Ok(()),
            Ok(owner) => {
                warn!(requested = %owner_id, returned = %owner.id, "owner lookup returned a different owner");
                Err(DomainError::not_found("owner", owner_id))
            }
            Err(e) => {
                warn!(owner_id = %owner_id, "owner could not be confirmed: {e}");
                Err(e)
            }
        }
    }
}
