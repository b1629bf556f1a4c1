//! [`OwnerDirectory`] backed by the `owner.get` RPC.

use std::sync::Arc;

use async_trait::async_trait;
use pets_core::protocol::payload::{decode_json, encode_id};
use pets_core::{DomainError, Operation, OwnerDto, OwnerId, RpcClient};
use tracing::debug;

use crate::application::owner_directory::OwnerDirectory;

pub struct RpcOwnerDirectory {
    rpc: Arc<RpcClient>,
}

impl RpcOwnerDirectory {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl OwnerDirectory for RpcOwnerDirectory {
    /// The owner service stays silent for an unknown owner, so "not found"
    /// normally surfaces here as `Timeout`.
    async fn find_owner(&self, id: OwnerId) -> Result<OwnerDto, DomainError> {
        debug!(owner_id = %id, "confirming owner");
        let body = self.rpc.call_op(Operation::OwnerGet, encode_id(id)).await?;
        if body.is_empty() {
            return Err(DomainError::not_found("owner", id));
        }
        decode_json(&body)
            .map_err(|e| DomainError::Unavailable(format!("undecodable owner reply: {e}")))
    }
}
