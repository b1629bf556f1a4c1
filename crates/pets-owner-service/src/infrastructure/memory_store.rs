//! In-memory owner store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use pets_core::{DomainError, OwnerId};

use crate::application::repository::OwnerRepository;
use crate::domain::owner::Owner;

#[derive(Debug, Clone, Default)]
pub struct InMemoryOwnerRepository {
    owners: Arc<RwLock<HashMap<OwnerId, Owner>>>,
}

impl InMemoryOwnerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.owners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OwnerRepository for InMemoryOwnerRepository {
    fn find(&self, id: OwnerId) -> Result<Option<Owner>, DomainError> {
        Ok(self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    fn find_all(&self) -> Result<Vec<Owner>, DomainError> {
        Ok(self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn save(&self, owner: Owner) -> Result<(), DomainError> {
        self.owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.id, owner);
        Ok(())
    }

    fn update(&self, owner: Owner) -> Result<bool, DomainError> {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        match owners.get_mut(&owner.id) {
            Some(stored) => {
                *stored = owner;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: OwnerId) -> Result<bool, DomainError> {
        Ok(self
            .owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some())
    }
}
