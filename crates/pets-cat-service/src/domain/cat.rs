//! The cat record as the cat service stores it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use pets_core::{CatDto, CatId, Color, CreateCatRequest, OwnerId};
use uuid::Uuid;

/// A stored cat.  `friends` is kept as a set so an edge can never be listed
/// twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cat {
    pub id: CatId,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub breed: String,
    pub color: Color,
    pub owner_id: OwnerId,
    pub friends: BTreeSet<CatId>,
}

impl Cat {
    /// A new cat with a fresh id and no friends.
    pub fn create(request: CreateCatRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            date_of_birth: request.date_of_birth,
            breed: request.breed,
            color: request.color,
            owner_id: request.owner_id,
            friends: BTreeSet::new(),
        }
    }

    pub fn is_friend_of(&self, other: CatId) -> bool {
        self.friends.contains(&other)
    }

    /// Replaces the scalar fields with those of `dto`.  The friend set is
    /// left alone.
    pub fn apply_scalars(&mut self, dto: &CatDto) {
        self.name = dto.name.clone();
        self.date_of_birth = dto.date_of_birth;
        self.breed = dto.breed.clone();
        self.color = dto.color;
        self.owner_id = dto.owner_id;
    }

    pub fn to_dto(&self) -> CatDto {
        CatDto {
            id: self.id,
            name: self.name.clone(),
            date_of_birth: self.date_of_birth,
            breed: self.breed.clone(),
            color: self.color,
            owner_id: self.owner_id,
            friends: self.friends.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateCatRequest {
        CreateCatRequest {
            name: "Tom".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2019, 3, 14).unwrap(),
            breed: "Maine Coon".to_string(),
            color: Color::Tabby,
            owner_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_created_cat_has_no_friends() {
        let cat = Cat::create(request());
        assert!(cat.friends.is_empty());
        assert!(cat.to_dto().friends.is_empty());
    }

    #[test]
    fn test_apply_scalars_keeps_friends() {
        // Arrange
        let mut cat = Cat::create(request());
        let friend = Uuid::new_v4();
        cat.friends.insert(friend);
        let mut dto = cat.to_dto();
        dto.name = "Thomas".to_string();
        dto.friends.clear();

        // Act
        cat.apply_scalars(&dto);

        // Assert
        assert_eq!(cat.name, "Thomas");
        assert!(cat.is_friend_of(friend));
    }
}
