//! Domain records shared by every service.
//!
//! These are the shapes that travel inside RPC payloads.  Each service keeps
//! its own storage representation; what it sends over the broker is always
//! one of the types below, encoded as JSON with camelCase field names.
//!
//! # Sub-modules
//!
//! - **`cat`**        – `CatDto`, `CreateCatRequest`, and the closed `Color` set.
//! - **`owner`**      – `OwnerDto` and `CreateOwnerRequest`.
//! - **`paging`**     – `PageRequest` / `Page<T>` for the list operations.
//! - **`error`**      – `DomainError`, the failure taxonomy every service maps to.
//! - **`friendship`** – The reconciliation diff used when a cat's friend list
//!   is replaced wholesale.

pub mod cat;
pub mod error;
pub mod friendship;
pub mod owner;
pub mod paging;

use chrono::NaiveDate;

use self::error::DomainError;

/// Rejects a birth date that is today or in the future.
pub(crate) fn ensure_in_past(
    field: &str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<(), DomainError> {
    if date >= today {
        return Err(DomainError::validation(format!(
            "{field} must be in the past (got {date})"
        )));
    }
    Ok(())
}

/// Rejects an empty or whitespace-only text field.
pub(crate) fn ensure_not_blank(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Today's date in UTC, used as the reference point for "in the past" checks.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
