//! GatewayService: one method per external operation.
//!
//! Each method checks access, validates the request record, issues one RPC
//! and maps the outcome:
//!
//! | Operation                  | Reply                 | No reply         |
//! |----------------------------|-----------------------|------------------|
//! | create owner / cat         | `Created` + record    | `BadRequest`     |
//! | get owner / cat            | `Ok` + record         | `NotFound`       |
//! | list owners / cats         | `Ok` + page           | `RequestTimeout` |
//! | update owner / cat         | `Ok` + record         | `NotFound`       |
//! | delete owner / cat         | `NoContent`           | `RequestTimeout` |
//! | make / delete friendship   | `Ok` or `BadRequest`  | `RequestTimeout` |
//! | change owner for pet       | `NoContent` or `BadRequest` | `RequestTimeout` |
//! | delete pet                 | `Ok` or `NotFound`    | `RequestTimeout` |
//!
//! A failed guard is `Forbidden` and sends nothing.  A record failing
//! validation is `BadRequest` and sends nothing.

use std::sync::Arc;

use chrono::NaiveDate;
use pets_core::domain::today;
use pets_core::protocol::payload::{
    decode_bool, decode_json, encode_id, encode_json, FriendPair, PetTransfer,
};
use pets_core::{
    CatDto, CatId, CreateCatRequest, CreateOwnerRequest, Operation, OwnerDto, OwnerId, Page,
    PageRequest, RpcClient, RpcError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::security::CatSecurityService;
use super::user_directory::UserDirectory;
use super::GatewayError;
use crate::domain::response::{EdgeResponse, EdgeStatus};
use crate::domain::user::{Role, User};

type EdgeResult<T> = Result<EdgeResponse<T>, GatewayError>;

pub struct GatewayService {
    rpc: Arc<RpcClient>,
    users: Arc<UserDirectory>,
    security: CatSecurityService,
    clock: fn() -> NaiveDate,
}

impl GatewayService {
    pub fn new(rpc: Arc<RpcClient>, users: Arc<UserDirectory>) -> Self {
        let security = CatSecurityService::new(Arc::clone(&rpc), Arc::clone(&users));
        Self {
            rpc,
            users,
            security,
            clock: today,
        }
    }

    /// Replaces the source of "today" used by birth-date validation.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn security(&self) -> &CatSecurityService {
        &self.security
    }

    // ── Owners ───────────────────────────────────────────────────────────────

    /// Open to everyone, including callers without a user.
    pub async fn create_owner(&self, request: CreateOwnerRequest) -> EdgeResult<OwnerDto> {
        if let Err(e) = request.validate((self.clock)()) {
            debug!("create owner rejected at the edge: {e}");
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        self.record(
            Operation::OwnerCreate,
            encode(&request)?,
            EdgeStatus::Created,
            EdgeStatus::BadRequest,
        )
        .await
    }

    pub async fn get_owner(&self, id: OwnerId) -> EdgeResult<OwnerDto> {
        self.record(Operation::OwnerGet, encode_id(id), EdgeStatus::Ok, EdgeStatus::NotFound).await
    }

    pub async fn get_all_owners(&self, request: &PageRequest) -> EdgeResult<Page<OwnerDto>> {
        self.record(
            Operation::OwnerGetAll,
            encode(request)?,
            EdgeStatus::Ok,
            EdgeStatus::RequestTimeout,
        )
        .await
    }

    pub async fn update_owner(&self, user: &User, dto: OwnerDto) -> EdgeResult<OwnerDto> {
        if !CatSecurityService::may_act_for_owner(user, dto.id) {
            return Ok(EdgeResponse::forbidden());
        }
        if let Err(e) = dto.validate((self.clock)()) {
            debug!("update owner rejected at the edge: {e}");
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        self.record(
            Operation::OwnerUpdate,
            encode(&dto)?,
            EdgeStatus::Ok,
            EdgeStatus::NotFound,
        )
        .await
    }

    /// On success the owner's gateway users are dropped as well.
    pub async fn delete_owner(&self, user: &User, id: OwnerId) -> EdgeResult<()> {
        if !CatSecurityService::may_act_for_owner(user, id) {
            return Ok(EdgeResponse::forbidden());
        }
        let response = self
            .acknowledge(Operation::OwnerDelete, encode_id(id), EdgeStatus::NoContent)
            .await?;
        if response.is_success() {
            let removed = self.users.remove_for_owner(id);
            info!(owner_id = %id, removed_users = removed, "owner deleted");
        }
        Ok(response)
    }

    pub async fn change_owner_for_pet(
        &self,
        user: &User,
        owner_id: OwnerId,
        pet_id: CatId,
    ) -> EdgeResult<()> {
        if !self.security.may_modify_cat(user, pet_id).await {
            return Ok(EdgeResponse::forbidden());
        }
        let body = encode(&PetTransfer { owner_id, pet_id })?;
        self.decide(
            Operation::OwnerChangeForPet,
            body,
            EdgeStatus::NoContent,
            EdgeStatus::BadRequest,
        )
        .await
    }

    pub async fn delete_pet(&self, user: &User, owner_id: OwnerId, pet_id: CatId) -> EdgeResult<()> {
        if !self.security.may_delete_pet(user, owner_id, pet_id).await {
            return Ok(EdgeResponse::forbidden());
        }
        let body = encode(&PetTransfer { owner_id, pet_id })?;
        self.decide(Operation::OwnerDeletePet, body, EdgeStatus::Ok, EdgeStatus::NotFound).await
    }

    // ── Cats ─────────────────────────────────────────────────────────────────

    pub async fn create_cat(&self, user: &User, request: CreateCatRequest) -> EdgeResult<CatDto> {
        if !CatSecurityService::may_act_for_owner(user, request.owner_id) {
            return Ok(EdgeResponse::forbidden());
        }
        if let Err(e) = request.validate((self.clock)()) {
            debug!("create cat rejected at the edge: {e}");
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        self.record(
            Operation::CatCreate,
            encode(&request)?,
            EdgeStatus::Created,
            EdgeStatus::BadRequest,
        )
        .await
    }

    pub async fn get_cat(&self, id: CatId) -> EdgeResult<CatDto> {
        self.record(Operation::CatGet, encode_id(id), EdgeStatus::Ok, EdgeStatus::NotFound).await
    }

    pub async fn get_all_cats(&self, request: &PageRequest) -> EdgeResult<Page<CatDto>> {
        self.record(
            Operation::CatGetAll,
            encode(request)?,
            EdgeStatus::Ok,
            EdgeStatus::RequestTimeout,
        )
        .await
    }

    pub async fn update_cat(&self, user: &User, dto: CatDto) -> EdgeResult<CatDto> {
        if !self.security.may_modify_cat(user, dto.id).await {
            return Ok(EdgeResponse::forbidden());
        }
        if let Err(e) = dto.validate((self.clock)()) {
            debug!("update cat rejected at the edge: {e}");
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        self.record(
            Operation::CatUpdate,
            encode(&dto)?,
            EdgeStatus::Ok,
            EdgeStatus::NotFound,
        )
        .await
    }

    pub async fn delete_cat(&self, user: &User, id: CatId) -> EdgeResult<()> {
        if !self.security.may_modify_cat(user, id).await {
            return Ok(EdgeResponse::forbidden());
        }
        self.acknowledge(Operation::CatDelete, encode_id(id), EdgeStatus::NoContent).await
    }

    pub async fn make_friends(&self, user: &User, id1: CatId, id2: CatId) -> EdgeResult<()> {
        if !self.security.may_change_friendship(user, id1, id2).await {
            return Ok(EdgeResponse::forbidden());
        }
        let body = encode(&FriendPair { id1, id2 })?;
        self.decide(Operation::CatMakeFriends, body, EdgeStatus::Ok, EdgeStatus::BadRequest).await
    }

    pub async fn delete_friendship(&self, user: &User, id1: CatId, id2: CatId) -> EdgeResult<()> {
        if !self.security.may_change_friendship(user, id1, id2).await {
            return Ok(EdgeResponse::forbidden());
        }
        let body = encode(&FriendPair { id1, id2 })?;
        self.decide(
            Operation::CatDeleteFriendship,
            body,
            EdgeStatus::Ok,
            EdgeStatus::BadRequest,
        )
        .await
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Registers a user bound to an existing owner.
    ///
    /// Anyone may create a `USER`; only an administrator may create an
    /// `ADMIN`.  The owner must be confirmed by the owner service.
    pub async fn create_user(
        &self,
        caller: Option<&User>,
        username: &str,
        role: Role,
        owner_id: OwnerId,
    ) -> EdgeResult<User> {
        if role == Role::Admin && !caller.is_some_and(User::is_admin) {
            return Ok(EdgeResponse::forbidden());
        }
        if username.trim().is_empty() {
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        if self.call(Operation::OwnerGet, encode_id(owner_id)).await?.is_none() {
            debug!(owner_id = %owner_id, "user not created: owner not confirmed");
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        let user = User::new(username.trim(), role, owner_id);
        if !self.users.insert(user.clone()) {
            return Ok(EdgeResponse::status(EdgeStatus::BadRequest));
        }
        Ok(EdgeResponse::with_body(EdgeStatus::Created, user))
    }

    /// A user may delete itself; an administrator may delete anyone.
    pub fn delete_user(&self, caller: &User, username: &str) -> EdgeResponse<()> {
        if !caller.is_admin() && caller.username != username {
            return EdgeResponse::forbidden();
        }
        self.users.remove(username);
        EdgeResponse::status(EdgeStatus::NoContent)
    }

    // ── RPC outcome mapping ──────────────────────────────────────────────────

    /// `Ok(None)` when no reply arrived in time.
    async fn call(&self, op: Operation, body: Vec<u8>) -> Result<Option<Vec<u8>>, GatewayError> {
        match self.rpc.call_op(op, body).await {
            Ok(reply) => Ok(Some(reply)),
            Err(RpcError::Timeout { .. }) => {
                debug!("{op}: no reply");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record<T: DeserializeOwned>(
        &self,
        op: Operation,
        body: Vec<u8>,
        on_reply: EdgeStatus,
        on_silence: EdgeStatus,
    ) -> EdgeResult<T> {
        match self.call(op, body).await? {
            Some(reply) => {
                let value = decode_json(&reply)
                    .map_err(|source| GatewayError::Reply { operation: op, source })?;
                Ok(EdgeResponse::with_body(on_reply, value))
            }
            None => Ok(EdgeResponse::status(on_silence)),
        }
    }

    async fn decide(
        &self,
        op: Operation,
        body: Vec<u8>,
        on_true: EdgeStatus,
        on_false: EdgeStatus,
    ) -> EdgeResult<()> {
        match self.call(op, body).await? {
            Some(reply) => {
                let ok = decode_bool(&reply)
                    .map_err(|source| GatewayError::Reply { operation: op, source })?;
                Ok(EdgeResponse::status(if ok { on_true } else { on_false }))
            }
            None => Ok(EdgeResponse::status(EdgeStatus::RequestTimeout)),
        }
    }

    async fn acknowledge(&self, op: Operation, body: Vec<u8>, on_reply: EdgeStatus) -> EdgeResult<()> {
        Ok(match self.call(op, body).await? {
            Some(_) => EdgeResponse::status(on_reply),
            None => EdgeResponse::status(EdgeStatus::RequestTimeout),
        })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GatewayError> {
    encode_json(value).map_err(GatewayError::Encode)
}
