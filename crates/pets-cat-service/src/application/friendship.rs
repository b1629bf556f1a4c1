//! Friendship graph operations inside one store transaction.
//!
//! Every edge is stored twice, once on each cat.  These helpers are the
//! only code that adds or removes edges, and they always touch both sides
//! in the same transaction.

use pets_core::{CatId, DomainError};

use super::repository::CatTransaction;
use crate::domain::cat::Cat;

fn reject_self(a: CatId, b: CatId) -> Result<(), DomainError> {
    if a == b {
        return Err(DomainError::validation(format!("cat {a} cannot befriend itself")));
    }
    Ok(())
}

fn load(tx: &dyn CatTransaction, id: CatId) -> Result<Cat, DomainError> {
    tx.get(id).ok_or_else(|| DomainError::not_found("cat", id))
}

/// Adds the edge `a`–`b`.  Returns `false` when it already existed.
///
/// # Errors
///
/// `Validation` when `a == b`; `NotFound` when either cat is missing.
pub fn link(tx: &mut dyn CatTransaction, a: CatId, b: CatId) -> Result<bool, DomainError> {
    reject_self(a, b)?;
    let mut cat_a = load(tx, a)?;
    let mut cat_b = load(tx, b)?;

    if cat_a.is_friend_of(b) && cat_b.is_friend_of(a) {
        return Ok(false);
    }
    cat_a.friends.insert(b);
    cat_b.friends.insert(a);
    tx.put(cat_a);
    tx.put(cat_b);
    Ok(true)
}

/// Removes the edge `a`–`b`.  Returns whether it existed.
///
/// # Errors
///
/// `Validation` when `a == b`; `NotFound` when either cat is missing.
pub fn unlink(tx: &mut dyn CatTransaction, a: CatId, b: CatId) -> Result<bool, DomainError> {
    reject_self(a, b)?;
    let mut cat_a = load(tx, a)?;
    let mut cat_b = load(tx, b)?;

    let existed = cat_a.friends.remove(&b) | cat_b.friends.remove(&a);
    if existed {
        tx.put(cat_a);
        tx.put(cat_b);
    }
    Ok(existed)
}

/// Removes `id` from every neighbour's friend list, then deletes it.
/// Returns `false` when the cat did not exist.
pub fn detach_and_remove(tx: &mut dyn CatTransaction, id: CatId) -> bool {
    let Some(cat) = tx.get(id) else {
        return false;
    };
    for friend_id in &cat.friends {
        if let Some(mut friend) = tx.get(*friend_id) {
            if friend.friends.remove(&id) {
                tx.put(friend);
            }
        }
    }
    tx.remove(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use pets_core::{Color, CreateCatRequest, OwnerId};
    use uuid::Uuid;

    #[derive(Default)]
    struct MapTx {
        cats: HashMap<CatId, Cat>,
    }

    impl CatTransaction for MapTx {
        fn get(&self, id: CatId) -> Option<Cat> {
            self.cats.get(&id).cloned()
        }
        fn put(&mut self, cat: Cat) {
            self.cats.insert(cat.id, cat);
        }
        fn remove(&mut self, id: CatId) -> bool {
            self.cats.remove(&id).is_some()
        }
        fn ids_by_owner(&self, owner_id: OwnerId) -> Vec<CatId> {
            self.cats
                .values()
                .filter(|c| c.owner_id == owner_id)
                .map(|c| c.id)
                .collect()
        }
    }

    fn add_cat(tx: &mut MapTx) -> CatId {
        let cat = Cat::create(CreateCatRequest {
            name: "Kit".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            breed: "Sphynx".to_string(),
            color: Color::Cream,
            owner_id: Uuid::new_v4(),
        });
        let id = cat.id;
        tx.put(cat);
        id
    }

    fn friends(tx: &MapTx, id: CatId) -> Vec<CatId> {
        tx.cats[&id].friends.iter().copied().collect()
    }

    #[test]
    fn test_link_is_mirrored_and_idempotent() {
        // Arrange
        let mut tx = MapTx::default();
        let a = add_cat(&mut tx);
        let b = add_cat(&mut tx);

        // Act
        let first = link(&mut tx, a, b).unwrap();
        let second = link(&mut tx, a, b).unwrap();

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(friends(&tx, a), vec![b]);
        assert_eq!(friends(&tx, b), vec![a]);
    }

    #[test]
    fn test_link_to_self_fails_even_for_unknown_cat() {
        let mut tx = MapTx::default();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            link(&mut tx, ghost, ghost),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_link_to_missing_cat_changes_nothing() {
        let mut tx = MapTx::default();
        let a = add_cat(&mut tx);
        let result = link(&mut tx, a, Uuid::new_v4());
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
        assert!(friends(&tx, a).is_empty());
    }

    #[test]
    fn test_unlink_reports_whether_edge_existed() {
        let mut tx = MapTx::default();
        let a = add_cat(&mut tx);
        let b = add_cat(&mut tx);
        link(&mut tx, a, b).unwrap();

        assert!(unlink(&mut tx, b, a).unwrap());
        assert!(!unlink(&mut tx, a, b).unwrap());
        assert!(friends(&tx, a).is_empty());
        assert!(friends(&tx, b).is_empty());
    }

    #[test]
    fn test_detach_leaves_no_dangling_references() {
        // Arrange
        let mut tx = MapTx::default();
        let a = add_cat(&mut tx);
        let b = add_cat(&mut tx);
        let c = add_cat(&mut tx);
        link(&mut tx, a, b).unwrap();
        link(&mut tx, a, c).unwrap();
        link(&mut tx, b, c).unwrap();

        // Act
        assert!(detach_and_remove(&mut tx, a));

        // Assert
        assert!(tx.get(a).is_none());
        assert_eq!(friends(&tx, b), vec![c]);
        assert_eq!(friends(&tx, c), vec![b]);
        assert!(!detach_and_remove(&mut tx, a));
    }
}
