//! Sort keys accepted by `cat.getAll`.

use std::cmp::Ordering;

use pets_core::SortDirection;

use super::cat::Cat;

/// A field cats can be ordered by.  Unknown names fall back to `Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatSortKey {
    Name,
    DateOfBirth,
    Breed,
    Color,
    OwnerId,
    Id,
}

impl CatSortKey {
    pub fn parse(field: &str) -> Self {
        match field {
            "name" => Self::Name,
            "dateOfBirth" => Self::DateOfBirth,
            "breed" => Self::Breed,
            "color" => Self::Color,
            "ownerId" => Self::OwnerId,
            _ => Self::Id,
        }
    }

    fn compare(self, a: &Cat, b: &Cat) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::DateOfBirth => a.date_of_birth.cmp(&b.date_of_birth),
            Self::Breed => a.breed.cmp(&b.breed),
            Self::Color => a.color.as_str().cmp(b.color.as_str()),
            Self::OwnerId => a.owner_id.cmp(&b.owner_id),
            Self::Id => Ordering::Equal,
        }
    }
}

/// Sorts `cats` by `key` in direction `dir`, breaking ties by id.
pub fn sort_cats(cats: &mut [Cat], key: CatSortKey, dir: SortDirection) {
    cats.sort_by(|a, b| {
        let primary = key.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match dir {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pets_core::{Color, CreateCatRequest};
    use uuid::Uuid;

    fn cat(name: &str, color: Color) -> Cat {
        Cat::create(CreateCatRequest {
            name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            breed: "Mixed".to_string(),
            color,
            owner_id: Uuid::new_v4(),
        })
    }

    #[test]
    fn test_unknown_sort_key_falls_back_to_id() {
        assert_eq!(CatSortKey::parse("whiskers"), CatSortKey::Id);
        assert_eq!(CatSortKey::parse("dateOfBirth"), CatSortKey::DateOfBirth);
    }

    #[test]
    fn test_sort_by_name_descending() {
        let mut cats = vec![cat("Ada", Color::Black), cat("Cleo", Color::White), cat("Bo", Color::Grey)];
        sort_cats(&mut cats, CatSortKey::Name, SortDirection::Desc);
        let names: Vec<&str> = cats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cleo", "Bo", "Ada"]);
    }

    #[test]
    fn test_sort_by_id_is_total() {
        let mut cats = vec![cat("A", Color::Black), cat("B", Color::Black), cat("C", Color::Black)];
        sort_cats(&mut cats, CatSortKey::Id, SortDirection::Asc);
        assert!(cats.windows(2).all(|w| w[0].id < w[1].id));
    }
}
