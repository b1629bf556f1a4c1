//! Decodes `owner.*` requests, runs them on [`OwnerService`], and encodes
//! the reply.
//!
//! | Operation            | Request body         | Reply                                     |
//! |----------------------|----------------------|-------------------------------------------|
//! | `owner.create`       | `CreateOwnerRequest` | `OwnerDto`, or nothing when invalid       |
//! | `owner.get`          | id                   | `OwnerDto`, or nothing when absent        |
//! | `owner.getAll`       | `PageRequest`        | `Page<OwnerDto>` (empty page when invalid)|
//! | `owner.update`       | `OwnerDto`           | `OwnerDto`, or nothing on failure         |
//! | `owner.changeForPet` | `PetTransfer`        | `true` / `false`                          |
//! | `owner.deletePet`    | `PetTransfer`        | `true` / `false`                          |
//! | `owner.delete`       | id                   | empty body; nothing if the cascade failed |

use std::sync::Arc;

use async_trait::async_trait;
use pets_core::protocol::payload::{
    decode_id, decode_json, encode_bool, encode_json, PetTransfer, ACK,
};
use pets_core::rpc::{HandlerError, HandlerReply, RpcHandler};
use pets_core::{CreateOwnerRequest, Operation, OwnerDto, Page, PageRequest};
use tracing::{debug, warn};

use crate::application::owner_service::OwnerService;
use crate::application::repository::OwnerRepository;

pub struct OwnerMessageListener<R: OwnerRepository> {
    service: Arc<OwnerService<R>>,
}

impl<R: OwnerRepository> OwnerMessageListener<R> {
    pub fn new(service: Arc<OwnerService<R>>) -> Self {
        Self { service }
    }
}

fn reply_json<T: serde::Serialize>(value: &T) -> Result<HandlerReply, HandlerError> {
    encode_json(value)
        .map(HandlerReply::Body)
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

fn reply_bool(op: Operation, outcome: Result<bool, pets_core::DomainError>) -> HandlerReply {
    let value = outcome.unwrap_or_else(|e| {
        warn!("{op} failed locally: {e}");
        false
    });
    HandlerReply::Body(encode_bool(value))
}

#[async_trait]
impl<R: OwnerRepository + 'static> RpcHandler for OwnerMessageListener<R> {
    async fn handle(&self, op: Operation, body: &[u8]) -> Result<HandlerReply, HandlerError> {
        let service = &self.service;
        match op {
            Operation::OwnerCreate => {
                let request: CreateOwnerRequest = decode_json(body)?;
                match service.create_owner(request) {
                    Ok(owner) => reply_json(&owner),
                    Err(e) => {
                        debug!("owner.create produced no owner: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::OwnerGet => {
                let id = decode_id(body)?;
                match service.get_owner(id) {
                    Ok(owner) => reply_json(&owner),
                    Err(e) => {
                        debug!("owner.get: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::OwnerGetAll => {
                let request: PageRequest = decode_json(body)?;
                match service.get_all_owners(&request) {
                    Ok(page) => reply_json(&page),
                    Err(e) => {
                        debug!("owner.getAll rejected: {e}");
                        reply_json(&Page::<OwnerDto>::empty(&request))
                    }
                }
            }
            Operation::OwnerUpdate => {
                let dto: OwnerDto = decode_json(body)?;
                match service.update_owner(dto) {
                    Ok(owner) => reply_json(&owner),
                    Err(e) => {
                        debug!("owner.update not applied: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            Operation::OwnerChangeForPet => {
                let transfer: PetTransfer = decode_json(body)?;
                let outcome = service
                    .change_owner_for_pet(transfer.owner_id, transfer.pet_id)
                    .await;
                Ok(reply_bool(op, outcome))
            }
            Operation::OwnerDeletePet => {
                let transfer: PetTransfer = decode_json(body)?;
                let outcome = service.delete_pet(transfer.owner_id, transfer.pet_id).await;
                Ok(reply_bool(op, outcome))
            }
            Operation::OwnerDelete => {
                let id = decode_id(body)?;
                match service.delete_owner(id).await {
                    Ok(_) => Ok(HandlerReply::Body(ACK.to_vec())),
                    Err(e) => {
                        warn!(owner_id = %id, "owner.delete not completed: {e}");
                        Ok(HandlerReply::Silent)
                    }
                }
            }
            other => Err(HandlerError::Unsupported(other)),
        }
    }
}
