//! The owner record as the owner service stores it.

use chrono::NaiveDate;
use pets_core::{CreateOwnerRequest, OwnerDto, OwnerId};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub id: OwnerId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
}

impl Owner {
    /// A new owner with a fresh id.
    pub fn create(request: CreateOwnerRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: request.first_name,
            last_name: request.last_name,
            birth_date: request.date_of_birth,
        }
    }

    /// Replaces the mutable fields with those of `dto`.
    pub fn apply_update(&mut self, dto: &OwnerDto) {
        self.first_name = dto.first_name.clone();
        self.last_name = dto.last_name.clone();
        self.birth_date = dto.birth_date;
    }

    pub fn to_dto(&self) -> OwnerDto {
        OwnerDto {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
        }
    }
}
