//! Gateway users.
//!
//! A user is bound to exactly one owner record.  Authentication itself
//! (passwords, sessions) happens in front of the gateway; the gateway only
//! receives the authenticated [`User`] and applies access rules to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pets_core::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub owner_id: OwnerId,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role, owner_id: OwnerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
            owner_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this user acts for `owner_id`.
    pub fn acts_for(&self, owner_id: OwnerId) -> bool {
        self.owner_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialises_upper_case() {
        let user = User::new("kim", Role::Admin, Uuid::nil());
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "ADMIN");
        assert_eq!(value["ownerId"], Uuid::nil().to_string());
    }
}
