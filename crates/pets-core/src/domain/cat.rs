//! Cat records as they travel between services.
//!
//! The cat service is the only owner of cat data.  Everything else (the
//! owner service, the gateway) sees cats exclusively through [`CatDto`]
//! values carried in RPC payloads.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::owner::OwnerId;
use super::{ensure_in_past, ensure_not_blank};

/// Opaque unique identifier of a cat.
pub type CatId = Uuid;

// ── Colors ────────────────────────────────────────────────────────────────────

/// Closed set of coat colours.  Serialised in upper case (`"GINGER"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Black,
    White,
    Grey,
    Ginger,
    Cream,
    Brown,
    Calico,
    Tabby,
}

impl Color {
    /// Every colour, in declaration order.
    pub const ALL: [Color; 8] = [
        Color::Black,
        Color::White,
        Color::Grey,
        Color::Ginger,
        Color::Cream,
        Color::Brown,
        Color::Calico,
        Color::Tabby,
    ];

    /// Upper-case wire name of the colour.
    pub fn as_str(self) -> &'static str {
        match self {
            Color::Black => "BLACK",
            Color::White => "WHITE",
            Color::Grey => "GREY",
            Color::Ginger => "GINGER",
            Color::Cream => "CREAM",
            Color::Brown => "BROWN",
            Color::Calico => "CALICO",
            Color::Tabby => "TABBY",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown color '{s}'")))
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Full cat record, including the friend adjacency list.
///
/// `friends` is the mirrored adjacency of the friendship graph: if cat A
/// lists B, then B lists A.  The cat service's write path maintains that;
/// nothing in the record itself enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatDto {
    pub id: CatId,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub breed: String,
    pub color: Color,
    /// Reference into the owner service's data.  Only checked at the moment
    /// of the last successful write, never continuously.
    pub owner_id: OwnerId,
    #[serde(default)]
    pub friends: Vec<CatId>,
}

impl CatDto {
    /// Checks the scalar fields (name, breed, birth date).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for a blank name or breed, or a
    /// birth date that is not strictly before `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_not_blank("name", &self.name)?;
        ensure_not_blank("breed", &self.breed)?;
        ensure_in_past("dateOfBirth", self.date_of_birth, today)
    }
}

/// Payload of `cat.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCatRequest {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub breed: String,
    pub color: Color,
    pub owner_id: OwnerId,
}

impl CreateCatRequest {
    /// Checks the scalar fields before any RPC or write happens.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for a blank name or breed, or a
    /// birth date that is not strictly before `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_not_blank("name", &self.name)?;
        ensure_not_blank("breed", &self.breed)?;
        ensure_in_past("dateOfBirth", self.date_of_birth, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request() -> CreateCatRequest {
        CreateCatRequest {
            name: "Tom".to_string(),
            date_of_birth: date(2020, 5, 1),
            breed: "Siamese".to_string(),
            color: Color::Cream,
            owner_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_color_serialises_in_upper_case() {
        let json = serde_json::to_string(&Color::Ginger).unwrap();
        assert_eq!(json, "\"GINGER\"");
    }

    #[test]
    fn test_color_from_str_is_case_insensitive() {
        assert_eq!("tabby".parse::<Color>().unwrap(), Color::Tabby);
        assert_eq!(" Black ".parse::<Color>().unwrap(), Color::Black);
    }

    #[test]
    fn test_color_from_str_rejects_unknown_value() {
        assert!(matches!(
            "purple".parse::<Color>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_cat_dto_uses_camel_case_field_names() {
        // Arrange
        let cat = CatDto {
            id: Uuid::nil(),
            name: "Tom".to_string(),
            date_of_birth: date(2020, 5, 1),
            breed: "Siamese".to_string(),
            color: Color::Black,
            owner_id: Uuid::nil(),
            friends: vec![],
        };

        // Act
        let value = serde_json::to_value(&cat).unwrap();

        // Assert
        assert!(value.get("dateOfBirth").is_some());
        assert!(value.get("ownerId").is_some());
        assert_eq!(value["dateOfBirth"], "2020-05-01");
    }

    #[test]
    fn test_cat_dto_without_friends_field_defaults_to_empty() {
        let json = format!(
            r#"{{"id":"{}","name":"Tom","dateOfBirth":"2020-05-01","breed":"x","color":"WHITE","ownerId":"{}"}}"#,
            Uuid::nil(),
            Uuid::nil()
        );
        let cat: CatDto = serde_json::from_str(&json).unwrap();
        assert!(cat.friends.is_empty());
    }

    #[test]
    fn test_create_request_accepts_past_birth_date() {
        assert!(request().validate(date(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_create_request_rejects_birth_date_today() {
        let mut req = request();
        req.date_of_birth = date(2024, 1, 1);
        assert!(req.validate(date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_create_request_rejects_blank_name() {
        let mut req = request();
        req.name = "   ".to_string();
        let err = req.validate(date(2024, 1, 1)).unwrap_err();
        assert_eq!(err, DomainError::validation("name must not be blank"));
    }
}
