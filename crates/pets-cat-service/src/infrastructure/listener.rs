//! Decodes `cat.*` requests, runs them on [`CatService`], and encodes the
//! reply.
//!
//! | Operation             | Request body        | Reply                                   |
//! |-----------------------|---------------------|-----------------------------------------|
//! | `cat.create`          | `CreateCatRequest`  | `CatDto`, or nothing on failure         |
//! | `cat.get`             | id                  | `CatDto`, or nothing when absent        |
//! | `cat.getAll`          | `PageRequest`       | `Page<CatDto>` (empty page when invalid)|
//! | `cat.update`          | `CatDto`            | `CatDto`, or nothing on failure         |
//! | `cat.makeFriends`     | `FriendPair`        | `true` / `false`                        |
//! | `cat.deleteFriendship`| `FriendPair`        | `true` if an edge existed               |
//! | `cat.delete`          | id                  | empty body                              |
//! | `cat.deleteByOwner`   | id                  | empty body                              |
//!
//! A body that cannot be decoded is a [`HandlerError::Malformed`], which
//! sends the request to the dead-letter queue.

use std::sync::Arc;

use async_trait::async_trait;
use pets_core::protocol::payload::{
    decode_id, decode_json, encode_bool, encode_json, FriendPair, ACK,
};
use pets_core::rpc::{HandlerError, HandlerReply, RpcHandler};
use pets_core::{CatDto, CreateCatRequest, Operation, Page, PageRequest};
use tracing::{debug, warn};

use crate::application::cat_service::CatService;
use crate::application::repository::CatRepository;

pub struct CatMessageListener<R: CatRepository> {
    service: Arc<CatService<R>>,
}

impl<R: CatRepository> CatMessageListener<R> {
    pub fn new(service: Arc<CatService<R>>) -> Self {
        Self { service }
    }
}

fn reply_json<T: serde::Serialize>(value: &T) -> Result<HandlerReply, HandlerError> {
    encode_json(value)
        .map(HandlerReply::Body)
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

#[async_trait]
impl<R: CatRepository + 'static> RpcHandler for CatMessageListener<R> {
    async fn handle(&self, op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
        let service = &self.service;
        match op {
            Operation::CatCreate => {
                let request: CreateCatRequest = decode_json(body)?;
                match service.create_cat(request).await {
                    Ok(cat) => reply_json(&cat),
                    Err(e) => {
                        debug!("cat.create produced no cat: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::CatGet => {
                let id = decode_id(body)?;
                match service.get_cat(id).await {
                    Ok(cat) => reply_json(&cat),
                    Err(e) => {
                        debug!("cat.get: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::CatGetAll => {
                let request: PageRequest = decode_json(body)?;
                match service.get_all_cats(&request).await {
                    Ok(page) => reply_json(&page),
                    Err(e) => {
                        debug!("cat.getAll rejected: {e}");
                        reply_json(&Page::<CatDto>::empty(&request))
                    }
                }
            }
            Operation::CatUpdate => {
                let dto: CatDto = decode_json(body)?;
                match service.update_cat(dto).await {
                    Ok(cat) => reply_json(&cat),
                    Err(e) => {
                        debug!("cat.update not applied: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::CatMakeFriends => {
                let pair: FriendPair = decode_json(body)?;
                let ok = match service.make_friends(pair.id1, pair.id2).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("cat.makeFriends refused: {e}");
                        false
                    }
                };
                Ok(HandlerReply::Body(encode_bool(ok)))
            }
            Operation::CatDeleteFriendship => {
                let pair: FriendPair = decode_json(body)?;
                let existed = service
                    .delete_friendship(pair.id1, pair.id2)
                    .await
                    .unwrap_or_else(|e| {
                        debug!("cat.deleteFriendship refused: {e}");
                        false
                    });
                Ok(HandlerReply::Body(encode_bool(existed)))
            }
            Operation::CatDelete => {
                let id = decode_id(body)?;
                match service.delete_cat(id).await {
                    Ok(_) => Ok(HandlerReply::Body(ACK.to_vec())),
                    Err(e) => {
                        warn!(cat_id = %id, "cat.delete failed: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::CatDeleteByOwner => {
                let owner_id = decode_id(body)?;
                match service.delete_cats_by_owner(owner_id).await {
                    Ok(_) => Ok(HandlerReply::Body(ACK.to_vec())),
                    Err(e) => {
                        // Silence makes the owner service keep the owner.
                        warn!(owner_id = %owner_id, "cat.deleteByOwner failed: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            other => Err(HandlerError::Unsupported(other)),
        }
    }
}
