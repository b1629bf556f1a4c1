//! Owner records as they travel between services.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::{ensure_in_past, ensure_not_blank};

/// Opaque unique identifier of an owner.
pub type OwnerId = Uuid;

/// Full owner record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDto {
    pub id: OwnerId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
}

impl OwnerDto {
    /// Checks the mutable fields of an update.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for blank names or a birth date
    /// that is not strictly before `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_not_blank("firstName", &self.first_name)?;
        ensure_not_blank("lastName", &self.last_name)?;
        ensure_in_past("birthDate", self.birth_date, today)
    }
}

/// Payload of `owner.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOwnerRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
}

impl CreateOwnerRequest {
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for blank names or a birth date
    /// that is not strictly before `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_not_blank("firstName", &self.first_name)?;
        ensure_not_blank("lastName", &self.last_name)?;
        ensure_in_past("dateOfBirth", self.date_of_birth, today)
    }
}
