//! Reconciliation diff for a cat's friend list.
//!
//! When a cat is updated, the incoming friend list is the *desired final
//! adjacency set*.  Rather than overwrite the stored list (which would leave
//! the other side of each edge stale), the cat service computes which edges
//! to drop and which to create, then applies each through the same
//! make-friends / delete-friendship steps used everywhere else.  That keeps
//! the graph symmetric after arbitrary updates.

use std::collections::HashSet;

use super::cat::CatId;

/// Edges to remove and edges to add, relative to one cat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendshipDiff {
    /// Friends present now but absent from the desired set.
    pub to_remove: Vec<CatId>,
    /// Friends absent now but present in the desired set.
    pub to_add: Vec<CatId>,
}

impl FriendshipDiff {
    /// Computes the delta between `current` and `desired`.
    ///
    /// Duplicates in either list are ignored; output order follows first
    /// appearance in the input.
    pub fn between(current: &[CatId], desired: &[CatId]) -> Self {
        let current_set: HashSet<CatId> = current.iter().copied().collect();
        let desired_set: HashSet<CatId> = desired.iter().copied().collect();

        let mut seen = HashSet::new();
        let to_remove = current
            .iter()
            .copied()
            .filter(|id| !desired_set.contains(id) && seen.insert(*id))
            .collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id) && seen.insert(*id))
            .collect();

        Self { to_remove, to_add }
    }

    /// `true` when the two sets are already equal.
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}
