//! In-memory cat store with all-or-nothing transactions.
//!
//! A transaction holds the write lock for its whole duration and stages its
//! writes in an overlay map.  The overlay is applied to the real map only
//! when the transaction's closure returns `Ok`, still under the same lock,
//! so readers see either none or all of a transaction's writes.
//!
//! Before applying the overlay the store checks that every friend edge it
//! touches is stored on both cats.  A one-sided edge fails the whole
//! transaction with [`DomainError::Conflict`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use pets_core::{CatId, DomainError, OwnerId};

use crate::application::repository::{CatRepository, CatTransaction};
use crate::domain::cat::Cat;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatRepository {
    cats: Arc<RwLock<HashMap<CatId, Cat>>>,
}

impl InMemoryCatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cats.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Overlay of writes on top of the committed map.  `None` marks a delete.
struct Staged<'a> {
    base: &'a HashMap<CatId, Cat>,
    writes: HashMap<CatId, Option<Cat>>,
}

impl CatTransaction for Staged<'_> {
    fn get(&self, id: CatId) -> Option<Cat> {
        match self.writes.get(&id) {
            Some(staged) => staged.clone(),
            None => self.base.get(&id).cloned(),
        }
    }

    fn put(&mut self, cat: Cat) {
        self.writes.insert(cat.id, Some(cat));
    }

    fn remove(&mut self, id: CatId) -> bool {
        let existed = self.get(id).is_some();
        self.writes.insert(id, None);
        existed
    }

    fn ids_by_owner(&self, owner_id: OwnerId) -> Vec<CatId> {
        let committed = self
            .base
            .values()
            .filter(|cat| !self.writes.contains_key(&cat.id));
        let staged = self.writes.values().flatten();
        committed
            .chain(staged)
            .filter(|cat| cat.owner_id == owner_id)
            .map(|cat| cat.id)
            .collect()
    }
}

/// Every edge touching a written cat, before or after the write, must be
/// present on both ends once the overlay is applied.
fn check_mirrored(
    base: &HashMap<CatId, Cat>,
    writes: &HashMap<CatId, Option<Cat>>,
) -> Result<(), DomainError> {
    let view = |id: &CatId| match writes.get(id) {
        Some(staged) => staged.as_ref(),
        None => base.get(id),
    };
    let no_friends = BTreeSet::new();

    for (id, write) in writes {
        let after = write.as_ref().map_or(&no_friends, |cat| &cat.friends);
        if after.contains(id) {
            return Err(DomainError::Conflict(format!("cat {id} lists itself as a friend")));
        }
        let before = base.get(id).map_or(&no_friends, |cat| &cat.friends);
        for neighbour in before.union(after) {
            let here = after.contains(neighbour);
            let there = view(neighbour).is_some_and(|cat| cat.friends.contains(id));
            if here != there {
                return Err(DomainError::Conflict(format!(
                    "friendship {id} - {neighbour} would be one-sided"
                )));
            }
        }
    }
    Ok(())
}

impl CatRepository for InMemoryCatRepository {
    fn find(&self, id: CatId) -> Result<Option<Cat>, DomainError> {
        Ok(self
            .cats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    fn find_all(&self) -> Result<Vec<Cat>, DomainError> {
        Ok(self
            .cats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn CatTransaction) -> Result<T, DomainError>,
    {
        let mut cats = self.cats.write().unwrap_or_else(PoisonError::into_inner);
        let (result, writes) = {
            let mut staged = Staged {
                base: &*cats,
                writes: HashMap::new(),
            };
            let result = work(&mut staged)?;
            (result, staged.writes)
        };
        check_mirrored(&cats, &writes)?;
        for (id, write) in writes {
            match write {
                Some(cat) => {
                    cats.insert(id, cat);
                }
                None => {
                    cats.remove(&id);
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pets_core::{Color, CreateCatRequest};
    use uuid::Uuid;

    fn cat(owner_id: OwnerId) -> Cat {
        Cat::create(CreateCatRequest {
            name: "Mia".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2018, 8, 8).unwrap(),
            breed: "Persian".to_string(),
            color: Color::White,
            owner_id,
        })
    }

    #[test]
    fn test_committed_transaction_is_visible() {
        // Arrange
        let repo = InMemoryCatRepository::new();
        let c = cat(Uuid::new_v4());
        let id = c.id;

        // Act
        repo.transaction(|tx| {
            tx.put(c);
            Ok(())
        })
        .unwrap();

        // Assert
        assert!(repo.find(id).unwrap().is_some());
    }

    #[test]
    fn test_failed_transaction_discards_every_write() {
        let repo = InMemoryCatRepository::new();
        let first = cat(Uuid::new_v4());
        let second = cat(Uuid::new_v4());

        let result: Result<(), DomainError> = repo.transaction(|tx| {
            tx.put(first);
            tx.put(second);
            Err(DomainError::validation("abort"))
        });

        assert!(result.is_err());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_transaction_reads_its_own_writes() {
        let repo = InMemoryCatRepository::new();
        let owner = Uuid::new_v4();
        let existing = cat(owner);
        repo.transaction(|tx| {
            tx.put(existing.clone());
            Ok(())
        })
        .unwrap();
        let added = cat(owner);

        let ids = repo
            .transaction(|tx| {
                tx.put(added.clone());
                assert!(tx.remove(existing.id));
                assert!(tx.get(existing.id).is_none());
                Ok(tx.ids_by_owner(owner))
            })
            .unwrap();

        assert_eq!(ids, vec![added.id]);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_one_sided_friendship_is_a_conflict() {
        // Arrange
        let repo = InMemoryCatRepository::new();
        let first = cat(Uuid::new_v4());
        let second = cat(Uuid::new_v4());
        repo.transaction(|tx| {
            tx.put(first.clone());
            tx.put(second.clone());
            Ok(())
        })
        .unwrap();
        let mut lonely = first.clone();
        lonely.friends.insert(second.id);

        // Act
        let result = repo.transaction(|tx| {
            tx.put(lonely);
            Ok(())
        });

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert!(repo.find(first.id).unwrap().unwrap().friends.is_empty());
    }

    #[test]
    fn test_deleting_a_cat_its_friend_still_lists_is_a_conflict() {
        let repo = InMemoryCatRepository::new();
        let mut first = cat(Uuid::new_v4());
        let mut second = cat(Uuid::new_v4());
        first.friends.insert(second.id);
        second.friends.insert(first.id);
        repo.transaction(|tx| {
            tx.put(first.clone());
            tx.put(second.clone());
            Ok(())
        })
        .unwrap();

        let result = repo.transaction(|tx| Ok(tx.remove(first.id)));

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(repo.len(), 2);
    }
}
