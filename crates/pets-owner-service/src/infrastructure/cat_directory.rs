//! [`CatDirectory`] backed by the `cat.*` RPC operations.
//!
//! The cat service answers `get` and `update` with nothing when it has no
//! result, so a missing cat normally arrives here as `Timeout`.

use std::sync::Arc;

use async_trait::async_trait;
use pets_core::protocol::payload::{decode_json, encode_id, encode_json};
use pets_core::{CatDto, CatId, DomainError, Operation, OwnerId, RpcClient};
use tracing::debug;

use crate::application::cat_directory::CatDirectory;

pub struct RpcCatDirectory {
    rpc: Arc<RpcClient>,
}

impl RpcCatDirectory {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    async fn fetch_cat(&self, op: Operation, body: Vec<u8>, id: CatId) -> Result<CatDto, DomainError> {
        let reply = self.rpc.call_op(op, body).await?;
        if reply.is_empty() {
            return Err(DomainError::not_found("cat", id));
        }
        decode_json(&reply)
            .map_err(|e| DomainError::Unavailable(format!("undecodable {op} reply: {e}")))
    }
}

#[async_trait]
impl CatDirectory for RpcCatDirectory {
    async fn get_cat(&self, id: CatId) -> Result<CatDto, DomainError> {
        debug!(cat_id = %id, "fetching cat");
        self.fetch_cat(Operation::CatGet, encode_id(id), id).await
    }

    async fn update_cat(&self, cat: CatDto) -> Result<CatDto, DomainError> {
        let id = cat.id;
        let body = encode_json(&cat)
            .map_err(|e| DomainError::Unavailable(format!("cannot encode cat {id}: {e}")))?;
        self.fetch_cat(Operation::CatUpdate, body, id).await
    }

    async fn delete_cat(&self, id: CatId) -> Result<(), DomainError> {
        self.rpc.call_op(Operation::CatDelete, encode_id(id)).await?;
        Ok(())
    }

    async fn delete_cats_by_owner(&self, owner_id: OwnerId) -> Result<(), DomainError> {
        debug!(owner_id = %owner_id, "requesting cascade delete of cats");
        self.rpc
            .call_op(Operation::CatDeleteByOwner, encode_id(owner_id))
            .await?;
        Ok(())
    }
}
