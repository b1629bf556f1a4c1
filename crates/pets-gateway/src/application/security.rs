//! Ownership checks and per-operation access guards.
//!
//! Administrators pass every guard.  A regular user may act on the owner
//! record it is bound to and on cats belonging to that owner; for a
//! friendship change it is enough to own either cat.  "Owns a cat" is
//! decided by [`CatSecurityService::is_cat_owner`], which asks the cat
//! service over RPC.

use std::sync::Arc;

use pets_core::protocol::payload::{decode_json, encode_id};
use pets_core::{CatDto, CatId, Operation, OwnerId, RpcClient};
use tracing::debug;

use super::user_directory::UserDirectory;
use crate::domain::user::User;

pub struct CatSecurityService {
    rpc: Arc<RpcClient>,
    users: Arc<UserDirectory>,
}

impl CatSecurityService {
    pub fn new(rpc: Arc<RpcClient>, users: Arc<UserDirectory>) -> Self {
        Self { rpc, users }
    }

    /// Whether the cat `cat_id` belongs to the owner `username` is bound to.
    ///
    /// Any failure along the way (unknown user, no reply, unreadable reply)
    /// is `false`.
    pub async fn is_cat_owner(&self, cat_id: CatId, username: &str) -> bool {
        let Some(user) = self.users.find(username) else {
            debug!(username, "ownership check for unknown user");
            return false;
        };
        match self.cat_owner(cat_id).await {
            Some(owner_id) => owner_id == user.owner_id,
            None => false,
        }
    }

    async fn cat_owner(&self, cat_id: CatId) -> Option<OwnerId> {
        match self.rpc.call_op(Operation::CatGet, encode_id(cat_id)).await {
            Ok(body) => decode_json::<CatDto>(&body).ok().map(|cat| cat.owner_id),
            Err(e) => {
                debug!(cat_id = %cat_id, "ownership check got no cat: {e}");
                None
            }
        }
    }

    // ── Guards ───────────────────────────────────────────────────────────────

    pub fn may_act_for_owner(user: &User, owner_id: OwnerId) -> bool {
        user.is_admin() || user.acts_for(owner_id)
    }

    pub async fn may_modify_cat(&self, user: &User, cat_id: CatId) -> bool {
        user.is_admin() || self.is_cat_owner(cat_id, &user.username).await
    }

    pub async fn may_change_friendship(&self, user: &User, a: CatId, b: CatId) -> bool {
        user.is_admin()
            || self.is_cat_owner(a, &user.username).await
            || self.is_cat_owner(b, &user.username).await
    }

    /// Deleting a pet through its owner requires acting for that owner
    /// *and* owning the pet.
    pub async fn may_delete_pet(&self, user: &User, owner_id: OwnerId, pet_id: CatId) -> bool {
        user.is_admin()
            || (user.acts_for(owner_id) && self.is_cat_owner(pet_id, &user.username).await)
    }
}
