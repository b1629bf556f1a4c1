//! In-memory store of gateway users, keyed by username.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use pets_core::OwnerId;
use tracing::info;
use uuid::Uuid;

use crate::domain::user::{Role, User};

/// Username of the administrator seeded at startup.
pub const DEFAULT_ADMIN: &str = "admin";

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding one administrator bound to a fresh owner id.
    pub fn with_admin(username: &str) -> Self {
        let directory = Self::new();
        directory.insert(User::new(username, Role::Admin, Uuid::new_v4()));
        directory
    }

    /// Adds `user`.  Returns `false` and changes nothing when the username
    /// is taken.
    pub fn insert(&self, user: User) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.username) {
            return false;
        }
        info!(username = %user.username, role = ?user.role, owner_id = %user.owner_id, "user registered");
        users.insert(user.username.clone(), user);
        true
    }

    pub fn find(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    pub fn remove(&self, username: &str) -> bool {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(username)
            .is_some()
    }

    /// Drops every user bound to `owner_id`; returns how many.
    pub fn remove_for_owner(&self, owner_id: OwnerId) -> usize {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let before = users.len();
        users.retain(|_, user| user.owner_id != owner_id);
        before - users.len()
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
