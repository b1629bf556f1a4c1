//! Sort keys accepted by `owner.getAll`.

use std::cmp::Ordering;

use pets_core::SortDirection;

use super::owner::Owner;

/// A field owners can be ordered by.  Unknown names fall back to `Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSortKey {
    FirstName,
    LastName,
    BirthDate,
    Id,
}

impl OwnerSortKey {
    pub fn parse(field: &str) -> Self {
        match field {
            "firstName" => Self::FirstName,
            "lastName" => Self::LastName,
            "birthDate" | "dateOfBirth" => Self::BirthDate,
            _ => Self::Id,
        }
    }
}

/// Sorts `owners` by `key` in direction `dir`, breaking ties by id.
pub fn sort_owners(owners: &mut [Owner], key: OwnerSortKey, dir: SortDirection) {
    owners.sort_by(|a, b| {
        let primary = match key {
            OwnerSortKey::FirstName => a.first_name.cmp(&b.first_name),
            OwnerSortKey::LastName => a.last_name.cmp(&b.last_name),
            OwnerSortKey::BirthDate => a.birth_date.cmp(&b.birth_date),
            OwnerSortKey::Id => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id));
        match dir {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        }
    });
}
